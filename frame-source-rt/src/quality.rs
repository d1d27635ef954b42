use analytics_types::QualityTier;
use image::{imageops::FilterType, RgbImage};

/// Downscales a packed RGB8 buffer to fit within `tier`'s ceiling when the
/// native size exceeds it; a no-op otherwise.
pub fn downscale_to_tier(
    width: u32,
    height: u32,
    pixels: &[u8],
    tier: QualityTier,
) -> (u32, u32, Vec<u8>) {
    let (max_w, max_h) = tier.max_dimensions();
    if width <= max_w && height <= max_h {
        return (width, height, pixels.to_vec());
    }

    let scale = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    let new_w = ((width as f64 * scale).round() as u32).max(1);
    let new_h = ((height as f64 * scale).round() as u32).max(1);

    let image = RgbImage::from_raw(width, height, pixels.to_vec())
        .expect("pixel buffer length must match width*height*3");
    let resized = image::imageops::resize(&image, new_w, new_h, FilterType::Triangle);
    (new_w, new_h, resized.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_within_tier_is_untouched() {
        let pixels = vec![128u8; 3 * 100 * 100];
        let (w, h, out) = downscale_to_tier(100, 100, &pixels, QualityTier::Hd1080);
        assert_eq!((w, h), (100, 100));
        assert_eq!(out, pixels);
    }

    #[test]
    fn oversized_frame_is_scaled_down_to_fit() {
        let pixels = vec![64u8; 3 * 3840 * 2160];
        let (w, h, out) = downscale_to_tier(3840, 2160, &pixels, QualityTier::Hd1080);
        assert!(w <= 1920 && h <= 1080);
        assert_eq!(out.len(), 3 * w as usize * h as usize);
    }
}
