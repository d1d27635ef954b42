use std::collections::HashMap;

use analytics_types::{AnalyticsRecord, StreamId};
use kinematics::StrideAndGrf;
use serde::Serialize;

/// The compact payload POSTed to the downstream core service after every
/// `store`, per spec's "detection count, active tracks, pose flag, max
/// speed, motion energy, key joint angles, stride metrics" list. This is
/// deliberately smaller than the full `AnalyticsRecord` — it is a summary
/// for a consumer that doesn't need per-detection bounding boxes.
#[derive(Debug, Clone, Serialize)]
pub struct DownstreamSummary {
    pub stream_id: StreamId,
    pub timestamp: f64,
    pub detection_count: usize,
    pub active_tracks: usize,
    pub pose_detected: bool,
    pub max_speed: f64,
    pub motion_energy: f64,
    pub joint_angles: HashMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride: Option<StrideSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrideSummary {
    pub left_contact_count: usize,
    pub right_contact_count: usize,
    pub asymmetry: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_reaction_force_n: Option<(f64, f64)>,
}

impl From<&StrideAndGrf> for StrideSummary {
    fn from(stride: &StrideAndGrf) -> Self {
        StrideSummary {
            left_contact_count: stride.left.contact_count,
            right_contact_count: stride.right.contact_count,
            asymmetry: stride.asymmetry,
            ground_reaction_force_n: stride
                .ground_reaction_force
                .as_ref()
                .map(|grf| (grf.horizontal_n, grf.vertical_n)),
        }
    }
}

impl DownstreamSummary {
    pub fn from_record(record: &AnalyticsRecord, stride: Option<&StrideAndGrf>) -> Self {
        let active_tracks = record.vibrio.as_ref().map(|v| v.tracks.len()).unwrap_or(0);
        let detection_count = record
            .vibrio
            .as_ref()
            .map(|v| v.detections.len())
            .unwrap_or(0);
        let pose_detected = record
            .moriarty
            .as_ref()
            .map(|m| m.pose_detected)
            .unwrap_or(false);
        let joint_angles = record
            .moriarty
            .as_ref()
            .map(|m| m.biomechanics.joint_angles.clone())
            .unwrap_or_default();

        DownstreamSummary {
            stream_id: record.stream_id.clone(),
            timestamp: record.timestamp.as_secs_f64(),
            detection_count,
            active_tracks,
            pose_detected,
            max_speed: record.max_track_speed(),
            motion_energy: record.motion_energy(),
            joint_angles,
            stride: stride.map(StrideSummary::from),
        }
    }
}
