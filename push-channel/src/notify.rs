use tokio::sync::mpsc;

use crate::summary_payload::DownstreamSummary;

const NOTIFY_TIMEOUT_SECS: u64 = 5;

/// A handle for sending downstream-notify summaries. Cheap to clone; every
/// clone feeds the same background sink task.
#[derive(Clone)]
pub struct DownstreamNotifier {
    tx: mpsc::Sender<DownstreamSummary>,
}

impl DownstreamNotifier {
    /// Spawns the sink task and returns a handle to it. The task POSTs each
    /// summary to `{core_service_url}/analytics/update`; a failed request is
    /// logged and dropped, never retried, so a notify call never backs up
    /// the pipeline.
    pub fn spawn(core_service_url: String, client: reqwest::Client) -> Self {
        let (tx, mut rx) = mpsc::channel::<DownstreamSummary>(256);
        tokio::spawn(async move {
            let endpoint = format!("{core_service_url}/analytics/update");
            while let Some(summary) = rx.recv().await {
                let stream_id = summary.stream_id.clone();
                let result = client
                    .post(&endpoint)
                    .json(&summary)
                    .timeout(std::time::Duration::from_secs(NOTIFY_TIMEOUT_SECS))
                    .send()
                    .await;
                match result {
                    Ok(response) if !response.status().is_success() => {
                        tracing::warn!(
                            %stream_id,
                            status = %response.status(),
                            "core service returned an error for analytics notification"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(%stream_id, error = %err, "failed to send analytics notification");
                    }
                    Ok(_) => {}
                }
            }
        });
        DownstreamNotifier { tx }
    }

    /// Enqueues `summary` for delivery. Drops it (logging a warning) if the
    /// sink's queue is full rather than blocking the caller.
    pub fn notify(&self, summary: DownstreamSummary) {
        if let Err(err) = self.tx.try_send(summary) {
            tracing::warn!(error = %err, "downstream notify queue full, dropping summary");
        }
    }
}
