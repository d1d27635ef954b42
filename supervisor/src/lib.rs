mod client;
mod decision;
mod error;
mod health;
mod loops;
mod metrics;

pub use client::CoreServiceClient;
pub use decision::{decide, Action};
pub use error::SupervisorError;
pub use health::{classify, majority_unhealthy, ServiceHealth, ServiceStatus};
pub use loops::{
    decision_loop, health_monitoring_loop, metrics_collection_loop, Supervisor,
    DECISION_INTERVAL, HEALTH_PROBE_INTERVAL, METRICS_COLLECTION_INTERVAL,
};
pub use metrics::{DecisionThresholds, MetricsLog, MetricsRow, StreamMetrics};
