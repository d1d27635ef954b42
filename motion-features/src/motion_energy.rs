use analytics_types::{Frame, MotionEnergy};

use crate::connected_components::connected_components;

/// Absolute grayscale difference threshold above which a pixel counts as
/// "moving".
const DIFF_THRESHOLD: i16 = 25;

/// Minimum connected-component area, in pixels, to count as an active
/// region.
const MIN_REGION_AREA: usize = 100;

/// Computes frame-difference motion energy between two consecutive frames
/// of identical dimensions.
pub fn compute_motion_energy(prev: &Frame, curr: &Frame) -> MotionEnergy {
    assert_eq!(prev.width, curr.width);
    assert_eq!(prev.height, curr.height);

    let width = curr.width as usize;
    let height = curr.height as usize;
    let mut mask = vec![false; width * height];
    let mut moving = 0usize;

    for y in 0..curr.height {
        for x in 0..curr.width {
            let a = prev.luma_at(x, y) as i16;
            let b = curr.luma_at(x, y) as i16;
            let moved = (a - b).abs() > DIFF_THRESHOLD;
            if moved {
                mask[y as usize * width + x as usize] = true;
                moving += 1;
            }
        }
    }

    let total = (width * height).max(1);
    let regions = connected_components(&mask, width, height, MIN_REGION_AREA);

    MotionEnergy {
        motion_energy: moving as f64 / total as f64,
        active_regions: regions.into_iter().map(|r| r.bbox).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::{StreamId, Timestamp};

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        let pixels = vec![value; 3 * width as usize * height as usize];
        Frame::new(
            StreamId::from("s"),
            0,
            Timestamp::from_secs_f64(0.0),
            width,
            height,
            pixels,
        )
    }

    #[test]
    fn identical_frames_have_zero_motion_energy() {
        let a = solid_frame(8, 8, 100);
        let b = solid_frame(8, 8, 100);
        let result = compute_motion_energy(&a, &b);
        approx::assert_relative_eq!(result.motion_energy, 0.0);
        assert!(result.active_regions.is_empty());
    }

    #[test]
    fn fully_changed_frame_has_motion_energy_one() {
        let a = solid_frame(8, 8, 0);
        let b = solid_frame(8, 8, 255);
        let result = compute_motion_energy(&a, &b);
        approx::assert_relative_eq!(result.motion_energy, 1.0);
    }

    #[test]
    fn motion_energy_is_bounded_in_zero_one() {
        let a = solid_frame(4, 4, 50);
        let mut pixels = vec![50u8; 3 * 16];
        for p in pixels.iter_mut().take(3 * 8) {
            *p = 200;
        }
        let b = Frame::new(
            StreamId::from("s"),
            1,
            Timestamp::from_secs_f64(0.0),
            4,
            4,
            pixels,
        );
        let result = compute_motion_energy(&a, &b);
        assert!((0.0..=1.0).contains(&result.motion_energy));
    }
}
