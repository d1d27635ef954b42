use crate::{Biomechanics, Detection, StreamId, Timestamp, TrackSummary};

/// Aggregate motion-energy features for one frame, per spec's Optical &
/// Motion component.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MotionEnergy {
    /// Fraction of pixels that changed beyond threshold, in `[0, 1]`.
    pub motion_energy: f64,
    /// Bounding boxes of connected regions with area > 100 px.
    pub active_regions: Vec<[f64; 4]>,
}

/// Aggregate sparse optical-flow features for one frame.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpticalFlow {
    pub mean_magnitude: f64,
    /// Radians.
    pub mean_direction: f64,
    /// `mean_magnitude / 255`, for comparability across resolutions.
    pub motion_intensity: f64,
}

/// Per-frame counters, mirroring the original `frame_stats` dict.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameStats {
    pub detection_count: usize,
    pub track_count: usize,
    pub avg_confidence: f64,
}

/// Output of the tracker branch of the Frame Pipeline.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VibrioData {
    pub detections: Vec<Detection>,
    pub tracks: Vec<TrackSummary>,
    pub motion_energy: MotionEnergy,
    pub optical_flow: OpticalFlow,
    pub frame_stats: FrameStats,
}

impl VibrioData {
    pub fn max_track_speed(&self) -> f64 {
        self.tracks
            .iter()
            .map(|t| t.speed)
            .fold(0.0_f64, f64::max)
    }
}

/// Output of the pose branch of the Frame Pipeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MoriartyData {
    pub pose_detected: bool,
    pub landmarks: std::collections::HashMap<String, crate::Landmark>,
    pub biomechanics: Biomechanics,
    pub pose_quality_score: f64,
}

/// One processed frame's worth of analytics, the unit stored by the
/// Analytics Store and broadcast over the Push Channel. Immutable once
/// stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalyticsRecord {
    pub stream_id: StreamId,
    pub frame_idx: u64,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vibrio: Option<VibrioData>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub moriarty: Option<MoriartyData>,
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl AnalyticsRecord {
    pub fn max_track_speed(&self) -> f64 {
        self.vibrio.as_ref().map(VibrioData::max_track_speed).unwrap_or(0.0)
    }

    pub fn motion_energy(&self) -> f64 {
        self.vibrio
            .as_ref()
            .map(|v| v.motion_energy.motion_energy)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_with_absent_branches_dropped() {
        let record = AnalyticsRecord {
            stream_id: StreamId::from("court-1"),
            frame_idx: 42,
            timestamp: Timestamp::from_secs_f64(10.0),
            vibrio: None,
            moriarty: None,
            processing_time: 0.02,
            error: None,
        };
        let encoded = serde_json::to_string(&record).unwrap();
        assert!(!encoded.contains("vibrio"));
        assert!(!encoded.contains("moriarty"));
        let decoded: AnalyticsRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn max_track_speed_is_zero_with_no_vibrio_branch() {
        let record = AnalyticsRecord {
            stream_id: StreamId::from("court-1"),
            frame_idx: 0,
            timestamp: Timestamp::from_secs_f64(0.0),
            vibrio: None,
            moriarty: None,
            processing_time: 0.0,
            error: None,
        };
        approx::assert_relative_eq!(record.max_track_speed(), 0.0);
    }
}
