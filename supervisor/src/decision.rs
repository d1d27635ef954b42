use std::collections::HashSet;

use analytics_types::{QualityTier, StreamId, StreamSettingsPatch};

use crate::metrics::{DecisionThresholds, StreamMetrics};

/// A settings patch this policy applies when analytics falls below the
/// target frame rate: drop resolution and target FPS together, cheaper
/// than either alone.
const REDUCED_QUALITY_TIER: QualityTier = QualityTier::Hd720;
const REDUCED_TARGET_FPS: f64 = 15.0;

/// Applied when a stream's error rate is too high: accept weaker
/// detections and tolerate longer track gaps rather than keep discarding
/// frames.
const PERMISSIVE_CONF_THRESHOLD: f64 = 0.3;
const PERMISSIVE_MAX_AGE: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Deactivate { stream_id: StreamId, reason: String },
    PatchSettings { stream_id: StreamId, patch: StreamSettingsPatch },
}

/// Applies capacity, performance, and robustness policies in order,
/// stopping at the first action taken for a given stream. Capacity is a
/// system-wide check that deactivates at most one stream per call; the
/// remaining two policies are evaluated per stream.
pub fn decide(metrics: &[StreamMetrics], thresholds: &DecisionThresholds) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut acted_on: HashSet<StreamId> = HashSet::new();

    if metrics.len() as f64 >= 0.8 * thresholds.max_concurrent_streams as f64 {
        let deactivation_target = metrics
            .iter()
            .filter(|m| m.viewer_count < 5 && m.betting_activity < 2)
            .min_by_key(|m| m.viewer_count);
        if let Some(target) = deactivation_target {
            actions.push(Action::Deactivate {
                stream_id: target.stream_id.clone(),
                reason: "resource optimization: approaching stream capacity".to_string(),
            });
            acted_on.insert(target.stream_id.clone());
        }
    }

    for m in metrics {
        if acted_on.contains(&m.stream_id) {
            continue;
        }

        if m.analytics_fps < thresholds.min_analytics_fps {
            actions.push(Action::PatchSettings {
                stream_id: m.stream_id.clone(),
                patch: StreamSettingsPatch {
                    quality_tier: Some(REDUCED_QUALITY_TIER),
                    target_fps: Some(REDUCED_TARGET_FPS),
                    ..Default::default()
                },
            });
            continue;
        }

        if m.error_rate > thresholds.max_error_rate {
            actions.push(Action::PatchSettings {
                stream_id: m.stream_id.clone(),
                patch: StreamSettingsPatch {
                    conf_threshold: Some(PERMISSIVE_CONF_THRESHOLD),
                    max_age: Some(PERMISSIVE_MAX_AGE),
                    ..Default::default()
                },
            });
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(stream_id: &str, viewer_count: u64, fps: f64, error_rate: f64, betting: u64) -> StreamMetrics {
        StreamMetrics {
            stream_id: StreamId::from(stream_id),
            viewer_count,
            analytics_fps: fps,
            detection_rate: 1.0,
            pose_detection_rate: 1.0,
            error_rate,
            betting_activity: betting,
        }
    }

    #[test]
    fn capacity_policy_deactivates_the_lowest_viewer_count_low_priority_stream() {
        let thresholds = DecisionThresholds {
            max_concurrent_streams: 5,
            ..Default::default()
        };
        let all = vec![
            metrics("a", 2, 30.0, 0.0, 0),
            metrics("b", 1, 30.0, 0.0, 0),
            metrics("c", 50, 30.0, 0.0, 0),
            metrics("d", 3, 30.0, 0.0, 1),
        ];
        let actions = decide(&all, &thresholds);
        assert_eq!(
            actions[0],
            Action::Deactivate {
                stream_id: StreamId::from("b"),
                reason: "resource optimization: approaching stream capacity".to_string(),
            }
        );
    }

    #[test]
    fn performance_policy_patches_low_fps_streams_that_were_not_deactivated() {
        let thresholds = DecisionThresholds::default();
        let all = vec![metrics("a", 100, 5.0, 0.0, 0)];
        let actions = decide(&all, &thresholds);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], Action::PatchSettings { patch, .. } if patch.target_fps == Some(REDUCED_TARGET_FPS)));
    }

    #[test]
    fn robustness_policy_only_applies_when_performance_did_not_already_fire() {
        let thresholds = DecisionThresholds::default();
        let all = vec![metrics("a", 100, 30.0, 0.5, 0)];
        let actions = decide(&all, &thresholds);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], Action::PatchSettings { patch, .. } if patch.conf_threshold == Some(PERMISSIVE_CONF_THRESHOLD)));
    }

    #[test]
    fn a_healthy_stream_gets_no_action() {
        let thresholds = DecisionThresholds::default();
        let all = vec![metrics("a", 100, 30.0, 0.0, 0)];
        assert!(decide(&all, &thresholds).is_empty());
    }
}
