use crate::Bbox;

/// A 2D point, used for track centers and centers of mass.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// The wire-level view of a track, as it appears in a
/// `vibrio.tracks[]` entry. The full Kalman state (covariance, velocity
/// terms) is internal to the tracker and never serialized.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackSummary {
    pub track_id: u64,
    pub position: Point2,
    /// Smoothed speed in km/h.
    pub speed: f64,
    pub age: u32,
    pub bbox: Bbox,
}
