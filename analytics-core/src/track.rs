use adskalman::StateAndCovariance;
use nalgebra::{Matrix7, U7, Vector7};

use crate::speed::SpeedEstimator;

/// One tracked object: Kalman state `[cx, cy, w, h, vx, vy, vs]` plus the
/// bookkeeping the tracker's reap/emit rules need.
pub struct Track {
    pub id: u64,
    pub estimate: StateAndCovariance<f64, U7>,
    pub hits: u32,
    pub time_since_update: u32,
    pub age: u32,
    pub class_id: u32,
    pub last_speed: f64,
    speed: SpeedEstimator,
}

impl Track {
    pub fn new(id: u64, bbox: [f64; 4], class_id: u32, pixel_to_meter: f64, fps: f64, smoothing_window: usize) -> Self {
        let cx = (bbox[0] + bbox[2]) / 2.0;
        let cy = (bbox[1] + bbox[3]) / 2.0;
        let w = (bbox[2] - bbox[0]).max(1.0);
        let h = (bbox[3] - bbox[1]).max(1.0);
        let state = Vector7::new(cx, cy, w, h, 0.0, 0.0, 0.0);
        let covariance = Matrix7::identity() * 1000.0;
        Track {
            id,
            estimate: StateAndCovariance::new(state, covariance),
            hits: 1,
            time_since_update: 0,
            age: 0,
            class_id,
            last_speed: 0.0,
            speed: SpeedEstimator::new(pixel_to_meter, fps, smoothing_window),
        }
    }

    /// Folds the track's current Kalman-filtered center into its speed
    /// window, returning (and caching) the smoothed km/h value.
    pub fn refresh_speed(&mut self) -> f64 {
        let center = self.center();
        self.last_speed = self.speed.update(center);
        self.last_speed
    }

    pub fn center(&self) -> (f64, f64) {
        let s = self.estimate.state();
        (s[0], s[1])
    }

    pub fn bbox(&self) -> [f64; 4] {
        let s = self.estimate.state();
        let (cx, cy, w, h) = (s[0], s[1], s[2], s[3]);
        [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
    }

}
