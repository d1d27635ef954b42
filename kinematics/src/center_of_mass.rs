use analytics_types::{LandmarkName, Point2, Pose};

const VISIBILITY_THRESHOLD: f64 = 0.5;

/// Equal-weighted mean of the four torso/hip landmarks, only when all four
/// are visible above threshold; `None` otherwise.
pub fn center_of_mass(pose: &Pose) -> Option<Point2> {
    let points: Vec<Point2> = LandmarkName::TORSO_HIP_SET
        .iter()
        .map(|name| pose.landmark(*name))
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .filter(|l| l.visibility > VISIBILITY_THRESHOLD)
        .map(|l| Point2 { x: l.x, y: l.y })
        .collect();

    if points.len() < LandmarkName::TORSO_HIP_SET.len() {
        return None;
    }

    let n = points.len() as f64;
    let x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let y = points.iter().map(|p| p.y).sum::<f64>() / n;
    Some(Point2 { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::Landmark;
    use std::collections::HashMap;

    fn pose_with(landmarks: &[(LandmarkName, f64, f64, f64)]) -> Pose {
        let mut map = HashMap::new();
        for (name, x, y, visibility) in landmarks {
            map.insert(name.to_string(), Landmark { x: *x, y: *y, visibility: *visibility });
        }
        Pose { frame_idx: 0, landmarks: map }
    }

    #[test]
    fn com_is_mean_of_four_torso_landmarks_when_all_visible() {
        let pose = pose_with(&[
            (LandmarkName::LeftShoulder, 0.0, 0.0, 1.0),
            (LandmarkName::RightShoulder, 10.0, 0.0, 1.0),
            (LandmarkName::LeftHip, 0.0, 10.0, 1.0),
            (LandmarkName::RightHip, 10.0, 10.0, 1.0),
        ]);
        let com = center_of_mass(&pose).unwrap();
        approx::assert_relative_eq!(com.x, 5.0);
        approx::assert_relative_eq!(com.y, 5.0);
    }

    #[test]
    fn missing_one_landmark_yields_no_com() {
        let pose = pose_with(&[
            (LandmarkName::LeftShoulder, 0.0, 0.0, 1.0),
            (LandmarkName::RightShoulder, 10.0, 0.0, 1.0),
            (LandmarkName::LeftHip, 0.0, 10.0, 1.0),
        ]);
        assert!(center_of_mass(&pose).is_none());
    }

    #[test]
    fn low_visibility_hip_yields_no_com() {
        let pose = pose_with(&[
            (LandmarkName::LeftShoulder, 0.0, 0.0, 1.0),
            (LandmarkName::RightShoulder, 10.0, 0.0, 1.0),
            (LandmarkName::LeftHip, 0.0, 10.0, 0.2),
            (LandmarkName::RightHip, 10.0, 10.0, 1.0),
        ]);
        assert!(center_of_mass(&pose).is_none());
    }
}
