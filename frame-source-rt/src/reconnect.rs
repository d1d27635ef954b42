use std::time::Duration;

/// Exponential backoff with a cap, used to govern reconnect attempts after
/// a transient source read failure. `base_delay * 2^attempt`, clamped to
/// `max_delay`; gives up after `max_attempts`.
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        ReconnectPolicy {
            base_delay,
            max_delay,
            max_attempts,
            attempt: 0,
        }
    }

    /// Returns the delay before the next reconnect attempt, or `None` once
    /// `max_attempts` have been exhausted (the caller should treat this as
    /// permanent failure).
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let scale = 1u64.checked_shl(self.attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay.saturating_mul(scale as u32).min(self.max_delay);
        self.attempt += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_each_attempt_until_the_cap() {
        let mut policy = ReconnectPolicy::new(
            Duration::from_millis(100),
            Duration::from_secs(5),
            10,
        );
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(400)));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(100), 2);
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn reset_allows_further_attempts() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(100), 1);
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
        policy.reset();
        assert!(policy.next_delay().is_some());
    }
}
