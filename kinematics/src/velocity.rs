use std::collections::HashMap;

use analytics_types::{Point2, Pose};

const VISIBILITY_THRESHOLD: f64 = 0.5;

/// Central-difference velocity `(p[i+1] - p[i-1]) / (2 * dt)` for every
/// landmark present and visible in all three poses. `dt = 1 / fps`.
///
/// Requires the full three-pose window (B2: a two-pose history yields no
/// velocities at all).
pub fn central_difference_velocities(
    before: &Pose,
    after: &Pose,
    fps: f64,
) -> HashMap<String, Point2> {
    let dt = 1.0 / fps;
    let mut velocities = HashMap::new();

    for (name, later) in &after.landmarks {
        let Some(earlier) = before.landmarks.get(name) else {
            continue;
        };
        if earlier.visibility < VISIBILITY_THRESHOLD || later.visibility < VISIBILITY_THRESHOLD {
            continue;
        }
        velocities.insert(
            name.clone(),
            Point2 {
                x: (later.x - earlier.x) / (2.0 * dt),
                y: (later.y - earlier.y) / (2.0 * dt),
            },
        );
    }

    velocities
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::Landmark;

    fn pose_with(x: f64, y: f64, visibility: f64) -> Pose {
        let mut landmarks = HashMap::new();
        landmarks.insert("left_wrist".to_string(), Landmark { x, y, visibility });
        Pose { frame_idx: 0, landmarks }
    }

    #[test]
    fn central_difference_matches_expected_formula_at_30fps() {
        let before = pose_with(0.0, 0.0, 1.0);
        let after = pose_with(20.0, 0.0, 1.0);
        let velocities = central_difference_velocities(&before, &after, 30.0);
        let v = velocities.get("left_wrist").unwrap();
        // (20 - 0) / (2 * 1/30) = 300
        approx::assert_relative_eq!(v.x, 300.0, max_relative = 1e-9);
    }

    #[test]
    fn low_visibility_excludes_the_landmark() {
        let before = pose_with(0.0, 0.0, 0.2);
        let after = pose_with(20.0, 0.0, 1.0);
        let velocities = central_difference_velocities(&before, &after, 30.0);
        assert!(velocities.get("left_wrist").is_none());
    }
}
