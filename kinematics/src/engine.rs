use std::collections::{HashMap, VecDeque};

use analytics_types::{Biomechanics, LandmarkName, Point2, Pose};

use crate::center_of_mass::center_of_mass;
use crate::grf::{com_acceleration, ground_reaction_force, GroundReactionForce};
use crate::joint_angle::{joint_angle_degrees, JOINTS};
use crate::stride::{stride_metrics, StrideMetrics};
use crate::velocity::central_difference_velocities;

/// Default bounded pose history length: 90 frames, about 3s at 30 FPS.
pub const DEFAULT_HISTORY_FRAMES: usize = 90;

const DEFAULT_CONTACT_THRESHOLD_PX_PER_S: f64 = 60.0;
const DEFAULT_BODY_MASS_KG: f64 = 70.0;

#[derive(Debug, Clone, Copy)]
pub struct KinematicsConfig {
    /// The stream's configured frame rate; `dt = 1 / fps` is used
    /// everywhere, including ground-reaction-force estimation (the
    /// original hard-codes `1/30` there; this system does not).
    pub fps: f64,
    pub history_frames: usize,
    pub contact_threshold_px_per_s: f64,
    pub body_mass_kg: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        KinematicsConfig {
            fps: 30.0,
            history_frames: DEFAULT_HISTORY_FRAMES,
            contact_threshold_px_per_s: DEFAULT_CONTACT_THRESHOLD_PX_PER_S,
            body_mass_kg: DEFAULT_BODY_MASS_KG,
        }
    }
}

/// Side-specific stride state plus the ground-reaction-force estimate at
/// the most recent detected contact, if any.
#[derive(Debug, Clone, Default)]
pub struct StrideAndGrf {
    pub left: StrideMetrics,
    pub right: StrideMetrics,
    pub asymmetry: u32,
    pub ground_reaction_force: Option<GroundReactionForce>,
}

/// Per-stream rolling pose history and the biomechanics/stride/GRF derived
/// from it. One instance per stream; never shared.
pub struct KinematicsEngine {
    config: KinematicsConfig,
    poses: VecDeque<Pose>,
    com_history: VecDeque<Option<Point2>>,
    left_ankle_history: VecDeque<Option<(f64, f64)>>,
    right_ankle_history: VecDeque<Option<(f64, f64)>>,
}

impl KinematicsEngine {
    pub fn new(config: KinematicsConfig) -> Self {
        KinematicsEngine {
            config,
            poses: VecDeque::with_capacity(config.history_frames),
            com_history: VecDeque::with_capacity(config.history_frames),
            left_ankle_history: VecDeque::with_capacity(config.history_frames),
            right_ankle_history: VecDeque::with_capacity(config.history_frames),
        }
    }

    fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
        buf.push_back(item);
        while buf.len() > cap {
            buf.pop_front();
        }
    }

    /// Feeds one more pose and returns the biomechanics and stride/GRF
    /// state derived from the history so far.
    pub fn push(&mut self, pose: Pose) -> (Biomechanics, StrideAndGrf) {
        let cap = self.config.history_frames;

        let com = center_of_mass(&pose);
        let left_ankle = pose
            .landmark(LandmarkName::LeftAnkle)
            .filter(|l| l.visibility > 0.5)
            .map(|l| (l.x, l.y));
        let right_ankle = pose
            .landmark(LandmarkName::RightAnkle)
            .filter(|l| l.visibility > 0.5)
            .map(|l| (l.x, l.y));

        let joint_angles = self.joint_angles(&pose);

        Self::push_bounded(&mut self.poses, pose, cap);
        Self::push_bounded(&mut self.com_history, com, cap);
        Self::push_bounded(&mut self.left_ankle_history, left_ankle, cap);
        Self::push_bounded(&mut self.right_ankle_history, right_ankle, cap);

        let velocities = self.velocities();
        let biomechanics = Biomechanics {
            joint_angles,
            velocities,
            center_of_mass: com,
        };

        let dt = 1.0 / self.config.fps;
        let left = stride_metrics(
            &dense(&self.left_ankle_history),
            dt,
            self.config.contact_threshold_px_per_s,
        );
        let right = stride_metrics(
            &dense(&self.right_ankle_history),
            dt,
            self.config.contact_threshold_px_per_s,
        );
        let asymmetry = crate::stride::asymmetry(&left, &right);

        let grf = self.latest_ground_reaction_force(dt);

        (
            biomechanics,
            StrideAndGrf {
                left,
                right,
                asymmetry,
                ground_reaction_force: grf,
            },
        )
    }

    fn joint_angles(&self, pose: &Pose) -> HashMap<String, f64> {
        let mut angles = HashMap::new();
        for (name, vertex, a, c) in JOINTS {
            let (Some(v), Some(pa), Some(pc)) =
                (pose.landmark(vertex), pose.landmark(a), pose.landmark(c))
            else {
                continue;
            };
            if let Some(angle) = joint_angle_degrees(v, pa, pc) {
                angles.insert(name.to_string(), angle);
            }
        }
        angles
    }

    /// Central-difference velocities spanning the two frames bracketing
    /// the middle of the most recent three received poses (B2: fewer than
    /// three poses in history yields no velocities at all).
    fn velocities(&self) -> HashMap<String, Point2> {
        if self.poses.len() < 3 {
            return HashMap::new();
        }
        let n = self.poses.len();
        central_difference_velocities(&self.poses[n - 3], &self.poses[n - 1], self.config.fps)
    }

    /// GRF is only ever non-zero at a detected foot-contact frame; this
    /// checks, causally (no look-ahead), whether the most recent ankle
    /// sample on either side looks like a contact, and if so estimates
    /// COM acceleration there via a second central difference.
    fn latest_ground_reaction_force(&self, dt: f64) -> Option<GroundReactionForce> {
        let left_contact = latest_is_contact(&dense(&self.left_ankle_history), dt, self.config.contact_threshold_px_per_s);
        let right_contact = latest_is_contact(&dense(&self.right_ankle_history), dt, self.config.contact_threshold_px_per_s);
        if !left_contact && !right_contact {
            return None;
        }

        let n = self.com_history.len();
        if n < 3 {
            return None;
        }
        let (Some(before), Some(mid), Some(after)) =
            (self.com_history[n - 3], self.com_history[n - 2], self.com_history[n - 1])
        else {
            return None;
        };
        let (ax, ay) = com_acceleration(before, mid, after, dt);
        Some(ground_reaction_force(self.config.body_mass_kg, ax, ay))
    }
}

fn dense(history: &VecDeque<Option<(f64, f64)>>) -> Vec<(f64, f64)> {
    history.iter().filter_map(|p| *p).collect()
}

/// Causal local-minimum check: true if the most recent velocity sample is
/// below threshold and did not increase from the one before it. Lacks the
/// forward-looking half of a true local-minimum test since no future data
/// exists yet at push time.
fn latest_is_contact(positions: &[(f64, f64)], dt: f64, threshold: f64) -> bool {
    if positions.len() < 2 {
        return false;
    }
    let last = positions[positions.len() - 1];
    let prev = positions[positions.len() - 2];
    let last_speed = ((last.0 - prev.0).powi(2) + (last.1 - prev.1).powi(2)).sqrt() / dt;
    if last_speed >= threshold {
        return false;
    }
    if positions.len() < 3 {
        return true;
    }
    let prev2 = positions[positions.len() - 3];
    let prev_speed = ((prev.0 - prev2.0).powi(2) + (prev.1 - prev2.1).powi(2)).sqrt() / dt;
    last_speed <= prev_speed
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::Landmark;

    fn pose_at(frame_idx: u64, shoulder_y: f64) -> Pose {
        let mut landmarks = HashMap::new();
        landmarks.insert(LandmarkName::LeftShoulder.to_string(), Landmark { x: 0.0, y: shoulder_y, visibility: 1.0 });
        landmarks.insert(LandmarkName::RightShoulder.to_string(), Landmark { x: 10.0, y: shoulder_y, visibility: 1.0 });
        landmarks.insert(LandmarkName::LeftHip.to_string(), Landmark { x: 0.0, y: shoulder_y + 20.0, visibility: 1.0 });
        landmarks.insert(LandmarkName::RightHip.to_string(), Landmark { x: 10.0, y: shoulder_y + 20.0, visibility: 1.0 });
        landmarks.insert(LandmarkName::LeftElbow.to_string(), Landmark { x: -10.0, y: shoulder_y + 30.0, visibility: 1.0 });
        landmarks.insert(LandmarkName::LeftWrist.to_string(), Landmark { x: -10.0, y: shoulder_y + 60.0, visibility: 1.0 });
        Pose { frame_idx, landmarks }
    }

    #[test]
    fn two_poses_yield_no_velocities_three_yield_one_per_landmark() {
        let mut engine = KinematicsEngine::new(KinematicsConfig::default());
        let (bio, _) = engine.push(pose_at(0, 0.0));
        assert!(bio.velocities.is_empty());
        let (bio, _) = engine.push(pose_at(1, 1.0));
        assert!(bio.velocities.is_empty());
        let (bio, _) = engine.push(pose_at(2, 2.0));
        assert!(!bio.velocities.is_empty());
        assert!(bio.velocities.contains_key(&LandmarkName::LeftShoulder.to_string()));
    }

    #[test]
    fn center_of_mass_present_when_all_torso_landmarks_visible() {
        let mut engine = KinematicsEngine::new(KinematicsConfig::default());
        let (bio, _) = engine.push(pose_at(0, 0.0));
        assert!(bio.center_of_mass.is_some());
    }

    #[test]
    fn left_elbow_angle_is_reported_when_triple_is_visible() {
        let mut engine = KinematicsEngine::new(KinematicsConfig::default());
        let (bio, _) = engine.push(pose_at(0, 0.0));
        assert!(bio.joint_angles.contains_key("left_elbow"));
        let angle = bio.joint_angles["left_elbow"];
        assert!((0.0..=180.0).contains(&angle));
    }
}
