use std::time::{Duration, Instant};

/// Enforces a target FPS over a stream of frame arrivals with newest-wins
/// dropping: if the source outpaces the target, intervening frames are
/// skipped rather than queued. There is no buffering of the backlog — a
/// frame arriving before the next target instant is simply discarded.
pub struct RateLimiter {
    target_interval: Duration,
    last_emitted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(target_fps: f64) -> Self {
        let target_interval = Duration::from_secs_f64(1.0 / target_fps.max(0.001));
        RateLimiter {
            target_interval,
            last_emitted: None,
        }
    }

    /// Call once per frame as it arrives from the underlying source. Returns
    /// `true` if this frame should be forwarded downstream, `false` if it
    /// should be dropped to hold the target rate.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_emitted {
            None => {
                self.last_emitted = Some(now);
                true
            }
            Some(last) if now.duration_since(last) >= self.target_interval => {
                self.last_emitted = Some(now);
                true
            }
            Some(_) => false,
        }
    }

    pub fn set_target_fps(&mut self, target_fps: f64) {
        self.target_interval = Duration::from_secs_f64(1.0 / target_fps.max(0.001));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_always_admitted() {
        let mut limiter = RateLimiter::new(30.0);
        assert!(limiter.admit(Instant::now()));
    }

    #[test]
    fn frames_faster_than_target_rate_are_dropped() {
        let mut limiter = RateLimiter::new(10.0);
        let t0 = Instant::now();
        assert!(limiter.admit(t0));
        assert!(!limiter.admit(t0 + Duration::from_millis(10)));
        assert!(limiter.admit(t0 + Duration::from_millis(110)));
    }
}
