use analytics_types::{Landmark, LandmarkName};

/// Minimum visibility for a landmark to participate in an angle
/// computation; below this the angle is "not reported", never fabricated.
const VISIBILITY_THRESHOLD: f64 = 0.5;

/// The eight two-sided joints this system reports angles for, each as
/// `(joint_name, vertex, neighbor_a, neighbor_c)`. The vertex is the point
/// the angle is measured at; `neighbor_a`/`neighbor_c` are its two arms.
pub const JOINTS: [(&str, LandmarkName, LandmarkName, LandmarkName); 8] = [
    (
        "left_shoulder",
        LandmarkName::LeftShoulder,
        LandmarkName::LeftElbow,
        LandmarkName::LeftHip,
    ),
    (
        "right_shoulder",
        LandmarkName::RightShoulder,
        LandmarkName::RightElbow,
        LandmarkName::RightHip,
    ),
    (
        "left_elbow",
        LandmarkName::LeftElbow,
        LandmarkName::LeftShoulder,
        LandmarkName::LeftWrist,
    ),
    (
        "right_elbow",
        LandmarkName::RightElbow,
        LandmarkName::RightShoulder,
        LandmarkName::RightWrist,
    ),
    (
        "left_hip",
        LandmarkName::LeftHip,
        LandmarkName::LeftShoulder,
        LandmarkName::LeftKnee,
    ),
    (
        "right_hip",
        LandmarkName::RightHip,
        LandmarkName::RightShoulder,
        LandmarkName::RightKnee,
    ),
    (
        "left_knee",
        LandmarkName::LeftKnee,
        LandmarkName::LeftHip,
        LandmarkName::LeftAnkle,
    ),
    (
        "right_knee",
        LandmarkName::RightKnee,
        LandmarkName::RightHip,
        LandmarkName::RightAnkle,
    ),
];

/// Angle in degrees, in `[0, 180]`, between vectors `vertex->a` and
/// `vertex->c`. `None` if any of the three visibilities is below
/// threshold.
pub fn joint_angle_degrees(vertex: &Landmark, a: &Landmark, c: &Landmark) -> Option<f64> {
    if vertex.visibility < VISIBILITY_THRESHOLD
        || a.visibility < VISIBILITY_THRESHOLD
        || c.visibility < VISIBILITY_THRESHOLD
    {
        return None;
    }

    let v1 = (a.x - vertex.x, a.y - vertex.y);
    let v2 = (c.x - vertex.x, c.y - vertex.y);

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let norm1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let norm2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();

    let cos_angle = (dot / (norm1 * norm2 + 1e-6)).clamp(-1.0, 1.0);
    Some(cos_angle.acos().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_angle_example_from_the_spec() {
        let shoulder = Landmark { x: 0.0, y: 0.0, visibility: 1.0 };
        let elbow = Landmark { x: 100.0, y: 0.0, visibility: 1.0 };
        let wrist = Landmark { x: 100.0, y: 100.0, visibility: 1.0 };
        let angle = joint_angle_degrees(&elbow, &shoulder, &wrist).unwrap();
        approx::assert_relative_eq!(angle, 90.0, max_relative = 1e-9);
    }

    #[test]
    fn low_visibility_on_any_point_yields_no_angle() {
        let vertex = Landmark { x: 0.0, y: 0.0, visibility: 0.4 };
        let a = Landmark { x: 1.0, y: 0.0, visibility: 1.0 };
        let c = Landmark { x: 0.0, y: 1.0, visibility: 1.0 };
        assert!(joint_angle_degrees(&vertex, &a, &c).is_none());
    }

    #[test]
    fn angle_is_always_within_zero_to_180() {
        let vertex = Landmark { x: 5.0, y: 5.0, visibility: 1.0 };
        let a = Landmark { x: 5.0, y: 0.0, visibility: 1.0 };
        let c = Landmark { x: 5.0, y: 0.0, visibility: 1.0 };
        let angle = joint_angle_degrees(&vertex, &a, &c).unwrap();
        assert!((0.0..=180.0).contains(&angle));
    }
}
