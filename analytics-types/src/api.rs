use crate::{AnalyticsRecord, SourceConfig, StreamId, StreamSettings, StreamSettingsPatch, StreamState, Summary};

/// `{success, error?}` response envelope required by spec for the HTTP
/// process endpoints.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessFrameRequest {
    pub stream_id: StreamId,
    /// Base64-encoded image bytes.
    pub frame_data: String,
    pub timestamp: crate::Timestamp,
    pub frame_idx: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartStreamRequest {
    pub stream_id: StreamId,
    #[serde(flatten)]
    pub source: SourceConfig,
    #[serde(default)]
    pub settings: Option<StreamSettings>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub ready: bool,
    pub active_stream_count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StreamMetricsResponse {
    pub fps: f64,
    pub detection_rate: f64,
    pub pose_rate: f64,
    pub error_rate: f64,
    pub avg_processing_time: f64,
    pub total_frames: u64,
}

impl From<&Summary> for StreamMetricsResponse {
    fn from(s: &Summary) -> Self {
        StreamMetricsResponse {
            fps: s.avg_fps,
            detection_rate: s.detection_rate,
            pose_rate: s.pose_rate,
            error_rate: s.error_rate,
            avg_processing_time: s.avg_processing_time,
            total_frames: s.total_frames,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActiveStreamEntry {
    pub stream_id: StreamId,
    pub state: StreamState,
    pub settings: StreamSettings,
    /// Concurrent viewer count, reported by the front-end that owns
    /// viewership and forwarded here so the supervisor's capacity policy
    /// can rank streams without a separate service call.
    #[serde(default)]
    pub viewer_count: u64,
}

/// Body of `PATCH /analytics/{stream_id}/settings`.
pub type SettingsPatchRequest = StreamSettingsPatch;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LatestRecordResponse(pub AnalyticsRecord);
