use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use analytics_types::StreamState;

use crate::client::CoreServiceClient;
use crate::decision::{decide, Action};
use crate::health::{classify, majority_unhealthy, ServiceHealth};
use crate::metrics::{DecisionThresholds, MetricsLog, MetricsRow, StreamMetrics};

pub const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(30);
pub const METRICS_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);
pub const DECISION_INTERVAL: Duration = Duration::from_secs(5);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const METRICS_LOG_CAPACITY: usize = 1000;

/// Shared state the three loops read and write. One instance per process.
pub struct Supervisor {
    pub client: CoreServiceClient,
    pub services: HashMap<String, String>,
    pub thresholds: DecisionThresholds,
    pub metrics: Mutex<HashMap<analytics_types::StreamId, StreamMetrics>>,
    pub metrics_log: Mutex<MetricsLog>,
    pub consecutive_unhealthy_majorities: Mutex<u32>,
}

impl Supervisor {
    pub fn new(client: CoreServiceClient, services: HashMap<String, String>, thresholds: DecisionThresholds) -> Self {
        Supervisor {
            client,
            services,
            thresholds,
            metrics: Mutex::new(HashMap::new()),
            metrics_log: Mutex::new(MetricsLog::new(METRICS_LOG_CAPACITY)),
            consecutive_unhealthy_majorities: Mutex::new(0),
        }
    }
}

/// Health probe loop: GETs `/health` on every named service, escalating to
/// emergency shutdown once a majority are unhealthy on two consecutive
/// probes.
pub async fn health_monitoring_loop(supervisor: Arc<Supervisor>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(HEALTH_PROBE_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let probes: Vec<ServiceHealth> = futures_join_all(&supervisor).await;
        let majority_now = majority_unhealthy(&probes);

        let mut streak = supervisor.consecutive_unhealthy_majorities.lock().await;
        if majority_now {
            *streak += 1;
            tracing::warn!(streak = *streak, "majority of services unhealthy");
            if *streak >= 2 {
                tracing::error!("more than half of services unhealthy for two consecutive probes, emergency shutdown");
                cancel.cancel();
                return;
            }
        } else {
            *streak = 0;
        }
    }
}

async fn futures_join_all(supervisor: &Supervisor) -> Vec<ServiceHealth> {
    let mut handles = Vec::new();
    for (name, url) in &supervisor.services {
        let client = supervisor.client.clone();
        let name = name.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            let result = client.probe_health(&name, &url).await;
            classify(&name, result)
        }));
    }
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(health) = handle.await {
            results.push(health);
        }
    }
    results
}

/// Metrics collection loop: lists active streams, fetches per-stream
/// analytics + betting activity, and appends a row to the bounded
/// system-metrics log.
pub async fn metrics_collection_loop(supervisor: Arc<Supervisor>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(METRICS_COLLECTION_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let streams = match supervisor.client.active_streams().await {
            Ok(streams) => streams,
            Err(err) => {
                tracing::error!(error = %err, "failed to list active streams");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        let mut collected = HashMap::new();
        for stream in streams.iter().filter(|s| s.state == StreamState::Active) {
            let analytics = supervisor.client.analytics_metrics(&stream.stream_id).await;
            let betting_activity = supervisor.client.betting_activity(&stream.stream_id).await;
            let metrics = StreamMetrics {
                stream_id: stream.stream_id.clone(),
                viewer_count: stream.viewer_count,
                analytics_fps: analytics.as_ref().map(|m| m.fps).unwrap_or(0.0),
                detection_rate: analytics.as_ref().map(|m| m.detection_rate).unwrap_or(0.0),
                pose_detection_rate: analytics.as_ref().map(|m| m.pose_rate).unwrap_or(0.0),
                error_rate: analytics.as_ref().map(|m| m.error_rate).unwrap_or(0.0),
                betting_activity,
            };

            supervisor.metrics_log.lock().await.push(MetricsRow {
                stream_id: metrics.stream_id.clone(),
                viewer_count: metrics.viewer_count,
                analytics_fps: metrics.analytics_fps,
                error_rate: metrics.error_rate,
                betting_activity: metrics.betting_activity,
            });
            collected.insert(stream.stream_id.clone(), metrics);
        }

        *supervisor.metrics.lock().await = collected;
    }
}

/// Decision loop: applies capacity/performance/robustness policies to the
/// latest metrics snapshot and carries out whatever actions result through
/// the same operations any client could invoke.
pub async fn decision_loop(supervisor: Arc<Supervisor>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(DECISION_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let snapshot: Vec<StreamMetrics> = supervisor.metrics.lock().await.values().cloned().collect();
        let actions = decide(&snapshot, &supervisor.thresholds);
        for action in actions {
            match action {
                Action::Deactivate { stream_id, reason } => {
                    if let Err(err) = supervisor.client.deactivate_stream(&stream_id, &reason).await {
                        tracing::error!(%stream_id, error = %err, "failed to deactivate stream");
                    }
                }
                Action::PatchSettings { stream_id, patch } => {
                    if let Err(err) = supervisor.client.patch_settings(&stream_id, &patch).await {
                        tracing::error!(%stream_id, error = %err, "failed to patch stream settings");
                    }
                }
            }
        }
    }
}
