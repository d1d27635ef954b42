/// Resolution ceiling a stream is allowed to run at. Native frames larger
/// than the tier's dimensions are downscaled on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Hd720,
    Hd1080,
    Uhd4k,
}

impl QualityTier {
    pub fn max_dimensions(&self) -> (u32, u32) {
        match self {
            QualityTier::Hd720 => (1280, 720),
            QualityTier::Hd1080 => (1920, 1080),
            QualityTier::Uhd4k => (3840, 2160),
        }
    }
}

/// How a stream's frames are acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Webcam,
    File,
    Rtmp,
    Http,
    Udp,
}

/// Where and how to open a stream's source, as supplied to `start_stream`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceConfig {
    pub source_type: SourceKind,
    pub source_url: String,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
}

fn default_reconnect_attempts() -> u32 {
    5
}

/// Tunable thresholds for one stream's analytics pipeline. Patchable
/// in-place at a frame boundary via `update_settings`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamSettings {
    pub quality_tier: QualityTier,
    pub target_fps: f64,
    pub conf_threshold: f64,
    pub iou_threshold: f64,
    pub min_hits: u32,
    pub max_age: u32,
    pub smoothing_window: usize,
    pub pixel_to_meter: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        StreamSettings {
            quality_tier: QualityTier::Hd1080,
            target_fps: 30.0,
            conf_threshold: 0.5,
            iou_threshold: 0.3,
            min_hits: 3,
            max_age: 30,
            smoothing_window: 5,
            pixel_to_meter: 0.01,
        }
    }
}

/// A partial update to `StreamSettings`; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamSettingsPatch {
    pub quality_tier: Option<QualityTier>,
    pub target_fps: Option<f64>,
    pub conf_threshold: Option<f64>,
    pub iou_threshold: Option<f64>,
    pub min_hits: Option<u32>,
    pub max_age: Option<u32>,
    pub smoothing_window: Option<usize>,
    pub pixel_to_meter: Option<f64>,
}

impl StreamSettingsPatch {
    pub fn apply_to(&self, base: &StreamSettings) -> StreamSettings {
        StreamSettings {
            quality_tier: self.quality_tier.unwrap_or(base.quality_tier),
            target_fps: self.target_fps.unwrap_or(base.target_fps),
            conf_threshold: self.conf_threshold.unwrap_or(base.conf_threshold),
            iou_threshold: self.iou_threshold.unwrap_or(base.iou_threshold),
            min_hits: self.min_hits.unwrap_or(base.min_hits),
            max_age: self.max_age.unwrap_or(base.max_age),
            smoothing_window: self.smoothing_window.unwrap_or(base.smoothing_window),
            pixel_to_meter: self.pixel_to_meter.unwrap_or(base.pixel_to_meter),
        }
    }
}

/// Lifecycle state of a stream, owned by the Stream Registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Inactive,
    Activating,
    Active,
    Deactivating,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_overrides_present_fields() {
        let base = StreamSettings::default();
        let patch = StreamSettingsPatch {
            target_fps: Some(15.0),
            ..Default::default()
        };
        let patched = patch.apply_to(&base);
        approx::assert_relative_eq!(patched.target_fps, 15.0);
        approx::assert_relative_eq!(patched.conf_threshold, base.conf_threshold);
        assert_eq!(patched.min_hits, base.min_hits);
    }
}
