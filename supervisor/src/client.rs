use std::time::{Duration, Instant};

use analytics_types::{
    ActiveStreamEntry, ApiResponse, SettingsPatchRequest, StreamId, StreamMetricsResponse,
};

use crate::error::SupervisorError;
use crate::health::HEALTH_PROBE_TIMEOUT;

/// Thin outbound HTTP client for the services the supervisor talks to: the
/// core service's health/streams surface and the analytics service's
/// metrics/latest endpoints. Advisory only — every call here is an action
/// any external client could also make.
#[derive(Clone)]
pub struct CoreServiceClient {
    http: reqwest::Client,
    core_service_url: String,
    analytics_service_url: String,
}

impl CoreServiceClient {
    pub fn new(core_service_url: String, analytics_service_url: String) -> Self {
        CoreServiceClient {
            http: reqwest::Client::new(),
            core_service_url,
            analytics_service_url,
        }
    }

    pub async fn probe_health(&self, service_name: &str, base_url: &str) -> Result<(u16, Duration), Duration> {
        let started = Instant::now();
        let result = self
            .http
            .get(format!("{base_url}/health"))
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await;
        let elapsed = started.elapsed();
        match result {
            Ok(response) => Ok((response.status().as_u16(), elapsed)),
            Err(err) => {
                tracing::warn!(service = service_name, error = %err, "health probe failed");
                Err(elapsed)
            }
        }
    }

    pub async fn active_streams(&self) -> Result<Vec<ActiveStreamEntry>, SupervisorError> {
        let url = format!("{}/api/streams", self.core_service_url);
        let response: ApiResponse<Vec<ActiveStreamEntry>> =
            self.http.get(url).send().await?.json().await?;
        Ok(response.data.unwrap_or_default())
    }

    pub async fn analytics_metrics(&self, stream_id: &StreamId) -> Option<StreamMetricsResponse> {
        let url = format!(
            "{}/api/analytics/{}/metrics",
            self.analytics_service_url, stream_id
        );
        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            _ => None,
        }
    }

    pub async fn betting_activity(&self, stream_id: &StreamId) -> u64 {
        let url = format!(
            "{}/api/betting/stream/{}/activity",
            self.core_service_url, stream_id
        );
        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                response
                    .json::<ApiResponse<Vec<serde_json::Value>>>()
                    .await
                    .ok()
                    .and_then(|body| body.data)
                    .map(|bets| bets.len() as u64)
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub async fn deactivate_stream(&self, stream_id: &StreamId, reason: &str) -> Result<(), SupervisorError> {
        tracing::info!(%stream_id, reason, "supervisor deactivating stream");
        let url = format!("{}/api/streams/{}/deactivate", self.core_service_url, stream_id);
        self.http.post(url).send().await?;
        Ok(())
    }

    pub async fn patch_settings(
        &self,
        stream_id: &StreamId,
        patch: &SettingsPatchRequest,
    ) -> Result<(), SupervisorError> {
        let url = format!("{}/analytics/{}/settings", self.analytics_service_url, stream_id);
        self.http.patch(url).json(patch).send().await?;
        Ok(())
    }
}
