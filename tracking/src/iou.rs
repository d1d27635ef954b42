/// Intersection-over-Union of two axis-aligned boxes given as `[x1, y1, x2, y2]`.
///
/// Returns a value in `[0, 1]`. Symmetric; identical boxes yield `1.0`.
/// Degenerate (zero-area) boxes yield `0.0` rather than dividing by zero.
pub fn iou(a: [f64; 4], b: [f64; 4]) -> f64 {
    let area = |bb: [f64; 4]| (bb[2] - bb[0]).max(0.0) * (bb[3] - bb[1]).max(0.0);

    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);

    let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = area(a) + area(b) - intersection;

    if union <= 0.0 {
        0.0
    } else {
        (intersection / union).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_boxes_have_iou_one() {
        let b = [10.0, 10.0, 90.0, 170.0];
        approx::assert_relative_eq!(iou(b, b), 1.0);
    }

    #[test]
    fn iou_is_symmetric() {
        let a = [0.0, 0.0, 80.0, 160.0];
        let b = [40.0, 40.0, 120.0, 200.0];
        approx::assert_relative_eq!(iou(a, b), iou(b, a));
    }

    #[test]
    fn disjoint_boxes_have_iou_zero() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [100.0, 100.0, 110.0, 110.0];
        approx::assert_relative_eq!(iou(a, b), 0.0);
    }

    #[test]
    fn iou_is_bounded() {
        let a = [0.0, 0.0, 80.0, 160.0];
        let b = [10.0, 10.0, 70.0, 150.0];
        let v = iou(a, b);
        assert!((0.0..=1.0).contains(&v));
    }
}
