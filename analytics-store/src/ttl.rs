use std::time::Duration;

/// Retention windows for the three things a stream entry holds. Each is
/// refreshed independently on every `store` call, matching spec's "refresh
/// TTL on the history and on the latest pointer" wording — settings/summary
/// share the coarser "per-stream state" window.
#[derive(Debug, Clone, Copy)]
pub struct TtlConfig {
    pub history: Duration,
    pub latest: Duration,
    pub state: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        TtlConfig {
            history: Duration::from_secs(3600),
            latest: Duration::from_secs(300),
            state: Duration::from_secs(86_400),
        }
    }
}
