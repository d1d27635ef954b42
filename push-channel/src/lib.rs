mod broadcaster;
mod latest;
mod notify;
mod summary_payload;

pub use broadcaster::{cadence_from_hz, run_connection, DEFAULT_CADENCE_HZ};
pub use latest::LatestRegistry;
pub use notify::DownstreamNotifier;
pub use summary_payload::{DownstreamSummary, StrideSummary};
