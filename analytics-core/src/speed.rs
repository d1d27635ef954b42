use std::collections::VecDeque;

/// Converts a pixel displacement between two consecutive frame centers into
/// km/h, then folds it into a trailing window and reports the window mean.
///
/// A track needs at least two centers to report a nonzero instantaneous
/// speed; before that this simply returns 0 and leaves the window untouched.
pub struct SpeedEstimator {
    pixel_to_meter: f64,
    fps: f64,
    window: VecDeque<f64>,
    window_len: usize,
    last_center: Option<(f64, f64)>,
}

impl SpeedEstimator {
    pub fn new(pixel_to_meter: f64, fps: f64, window_len: usize) -> Self {
        SpeedEstimator {
            pixel_to_meter,
            fps,
            window: VecDeque::with_capacity(window_len.max(1)),
            window_len: window_len.max(1),
            last_center: None,
        }
    }

    /// Called once per frame this track is emitted, with its current
    /// Kalman-filtered center. Returns the trailing-window mean speed in
    /// km/h.
    pub fn update(&mut self, center: (f64, f64)) -> f64 {
        let instantaneous = match self.last_center {
            None => 0.0,
            Some(prev) => {
                let dx = center.0 - prev.0;
                let dy = center.1 - prev.1;
                let pixel_dist = (dx * dx + dy * dy).sqrt();
                let meters_per_sec = pixel_dist * self.pixel_to_meter * self.fps;
                meters_per_sec * 3.6
            }
        };
        self.last_center = Some(center);

        if self.window.len() >= self.window_len {
            self.window.pop_front();
        }
        self.window.push_back(instantaneous);
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_reports_zero() {
        let mut estimator = SpeedEstimator::new(0.01, 30.0, 5);
        assert_eq!(estimator.update((0.0, 0.0)), 0.0);
    }

    #[test]
    fn constant_speed_motion_converges_to_a_stable_km_per_h_value() {
        // 1 px/frame at 30fps, 0.01 m/px: v = 0.3 m/s = 1.08 km/h
        let mut estimator = SpeedEstimator::new(0.01, 30.0, 5);
        let mut last = 0.0;
        let mut result = 0.0;
        for _ in 0..10 {
            last += 1.0;
            result = estimator.update((last, 0.0));
        }
        approx::assert_relative_eq!(result, 1.08, max_relative = 1e-6);
    }

    #[test]
    fn window_is_bounded_to_the_configured_length() {
        let mut estimator = SpeedEstimator::new(1.0, 1.0, 3);
        for i in 0..10 {
            estimator.update((i as f64, 0.0));
        }
        assert!(estimator.window.len() <= 3);
    }
}
