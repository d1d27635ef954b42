use std::collections::HashMap;

use crate::Point2;

/// A single named landmark in pixel coordinates with an extractor-reported
/// visibility in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub visibility: f64,
}

/// The canonical two-sided joint set this system computes angles for,
/// matching the original pose analyzer's landmark vocabulary. Kept as an
/// enum (rather than bare strings) everywhere except the wire map key, so
/// kinematics code can exhaustively match the set it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LandmarkName {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl LandmarkName {
    pub const TORSO_HIP_SET: [LandmarkName; 4] = [
        LandmarkName::LeftShoulder,
        LandmarkName::RightShoulder,
        LandmarkName::LeftHip,
        LandmarkName::RightHip,
    ];

    pub fn as_str(&self) -> &'static str {
        use LandmarkName::*;
        match self {
            LeftShoulder => "left_shoulder",
            RightShoulder => "right_shoulder",
            LeftElbow => "left_elbow",
            RightElbow => "right_elbow",
            LeftWrist => "left_wrist",
            RightWrist => "right_wrist",
            LeftHip => "left_hip",
            RightHip => "right_hip",
            LeftKnee => "left_knee",
            RightKnee => "right_knee",
            LeftAnkle => "left_ankle",
            RightAnkle => "right_ankle",
        }
    }
}

impl std::fmt::Display for LandmarkName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joint angle and velocity computations derived from a pose, named by the
/// wire schema's `biomechanics` object.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Biomechanics {
    /// Degrees, in `[0, 180]`. Absent entries mean "not reported" (missing
    /// history or low visibility), never a fabricated value.
    pub joint_angles: HashMap<String, f64>,
    /// Pixels/second per landmark, central-difference estimate.
    pub velocities: HashMap<String, Point2>,
    pub center_of_mass: Option<Point2>,
}

/// A full pose extraction result for one frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pose {
    pub frame_idx: u64,
    pub landmarks: HashMap<String, Landmark>,
}

impl Pose {
    pub fn landmark(&self, name: LandmarkName) -> Option<&Landmark> {
        self.landmarks.get(name.as_str())
    }

    /// Mean visibility across all reported landmarks, matching the
    /// original pose analyzer's `pose_quality_score`.
    pub fn quality_score(&self) -> f64 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.landmarks.values().map(|l| l.visibility).sum();
        sum / self.landmarks.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_score_is_mean_visibility() {
        let mut landmarks = HashMap::new();
        landmarks.insert(
            "left_shoulder".to_string(),
            Landmark { x: 0.0, y: 0.0, visibility: 1.0 },
        );
        landmarks.insert(
            "right_shoulder".to_string(),
            Landmark { x: 1.0, y: 0.0, visibility: 0.5 },
        );
        let pose = Pose { frame_idx: 0, landmarks };
        approx::assert_relative_eq!(pose.quality_score(), 0.75);
    }

    #[test]
    fn empty_pose_has_zero_quality() {
        let pose = Pose { frame_idx: 0, landmarks: HashMap::new() };
        approx::assert_relative_eq!(pose.quality_score(), 0.0);
    }
}
