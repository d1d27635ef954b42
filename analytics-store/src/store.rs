use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use analytics_types::{AnalyticsRecord, StreamId, StreamSettings, Summary, SummaryStatus, Timestamp};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::data::StreamData;
use crate::ttl::TtlConfig;

/// Keyed, time-indexed store for analytics records. One `RwLock` per
/// stream rather than a single lock over the whole map, so a slow reader
/// on one stream never stalls writers on another.
pub struct AnalyticsStore {
    streams: std::sync::Mutex<HashMap<StreamId, Arc<RwLock<StreamData>>>>,
    ttl: TtlConfig,
}

impl AnalyticsStore {
    pub fn new(ttl: TtlConfig) -> Self {
        AnalyticsStore {
            streams: std::sync::Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn entry(&self, stream_id: &StreamId) -> Option<Arc<RwLock<StreamData>>> {
        self.streams.lock().unwrap().get(stream_id).cloned()
    }

    /// Creates the summary with zero counters. Re-initializing an already
    /// known stream resets its history and settings, matching a fresh
    /// `start_stream` call.
    pub async fn initialize(&self, stream_id: StreamId, settings: StreamSettings, started_at: Timestamp) {
        let data = StreamData::new(settings, Summary::new(started_at));
        self.streams
            .lock()
            .unwrap()
            .insert(stream_id, Arc::new(RwLock::new(data)));
    }

    /// Appends `record` keyed by its timestamp, advances the latest
    /// pointer, refreshes the history/latest TTLs, and folds the record
    /// into the running summary — all under one write lock so stream-local
    /// write order matches call order.
    pub async fn store(&self, stream_id: &StreamId, record: AnalyticsRecord) -> Result<(), StoreError> {
        let entry = self
            .entry(stream_id)
            .ok_or_else(|| StoreError::UnknownStream(stream_id.clone()))?;
        let mut data = entry.write().await;

        let detected = record
            .vibrio
            .as_ref()
            .map(|v| !v.detections.is_empty())
            .unwrap_or(false);
        let posed = record
            .moriarty
            .as_ref()
            .map(|m| m.pose_detected)
            .unwrap_or(false);
        let errored = record.error.is_some();
        let detection_count = record
            .vibrio
            .as_ref()
            .map(|v| v.detections.len() as u64)
            .unwrap_or(0);
        let max_speed = record.max_track_speed();
        let processing_time = record.processing_time;

        data.summary
            .record(detection_count, detected, posed, errored, processing_time, max_speed);

        let now = Instant::now();
        data.history.insert(record.timestamp.as_nanos(), record.clone());
        data.history_touched_at = now;
        data.latest = Some(record);
        data.latest_touched_at = now;

        Ok(())
    }

    /// O(1): returns `None` if the stream never wrote or its latest pointer
    /// has aged out (cleared by the background sweep, not checked here).
    pub async fn latest(&self, stream_id: &StreamId) -> Option<AnalyticsRecord> {
        let entry = self.entry(stream_id)?;
        entry.read().await.latest.clone()
    }

    /// Inclusive, chronological.
    pub async fn range(
        &self,
        stream_id: &StreamId,
        t0: Timestamp,
        t1: Timestamp,
    ) -> Result<Vec<AnalyticsRecord>, StoreError> {
        let entry = self
            .entry(stream_id)
            .ok_or_else(|| StoreError::UnknownStream(stream_id.clone()))?;
        let data = entry.read().await;
        Ok(data
            .history
            .range(t0.as_nanos()..=t1.as_nanos())
            .map(|(_, record)| record.clone())
            .collect())
    }

    pub async fn summary(&self, stream_id: &StreamId) -> Result<Summary, StoreError> {
        let entry = self
            .entry(stream_id)
            .ok_or_else(|| StoreError::UnknownStream(stream_id.clone()))?;
        Ok(entry.read().await.summary.clone())
    }

    /// Deletes history, latest, and current settings; the summary survives,
    /// marked inactive.
    pub async fn cleanup(&self, stream_id: &StreamId, ended_at: Timestamp) -> Result<(), StoreError> {
        let entry = self
            .entry(stream_id)
            .ok_or_else(|| StoreError::UnknownStream(stream_id.clone()))?;
        let mut data = entry.write().await;
        data.history.clear();
        data.latest = None;
        data.settings = None;
        data.summary.mark_inactive(ended_at);
        Ok(())
    }

    /// Runs forever, waking every `period` to expire history/latest/settings
    /// whose TTL has elapsed. A periodic sweep rather than a lazy per-read
    /// check, since the TTL figures here are minutes to a day and a sweep
    /// every few seconds is indistinguishable to callers.
    pub async fn run_ttl_sweeper(self: Arc<Self>, period: std::time::Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    async fn sweep_once(&self) {
        let entries: Vec<(StreamId, Arc<RwLock<StreamData>>)> = self
            .streams
            .lock()
            .unwrap()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();

        let now = Instant::now();
        for (stream_id, entry) in entries {
            let mut data = entry.write().await;
            if now.duration_since(data.history_touched_at) > self.ttl.history && !data.history.is_empty() {
                tracing::trace!(%stream_id, "history TTL elapsed, clearing");
                data.history.clear();
            }
            if now.duration_since(data.latest_touched_at) > self.ttl.latest && data.latest.is_some() {
                tracing::trace!(%stream_id, "latest TTL elapsed, clearing");
                data.latest = None;
            }
            if now.duration_since(data.state_touched_at) > self.ttl.state && data.settings.is_some() {
                tracing::trace!(%stream_id, "per-stream state TTL elapsed, clearing settings");
                data.settings = None;
            }
            if data.summary.status == SummaryStatus::Inactive
                && data.history.is_empty()
                && data.latest.is_none()
                && data.settings.is_none()
            {
                drop(data);
                self.streams.lock().unwrap().remove(&stream_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::StreamId;
    use std::time::Duration;

    fn record(stream_id: &StreamId, secs: f64, processing_time: f64) -> AnalyticsRecord {
        AnalyticsRecord {
            stream_id: stream_id.clone(),
            frame_idx: 0,
            timestamp: Timestamp::from_secs_f64(secs),
            vibrio: None,
            moriarty: None,
            processing_time,
            error: None,
        }
    }

    #[tokio::test]
    async fn store_then_latest_round_trips() {
        let store = AnalyticsStore::new(TtlConfig::default());
        let id = StreamId::from("court-1");
        store.initialize(id.clone(), StreamSettings::default(), Timestamp::from_secs_f64(0.0)).await;
        store.store(&id, record(&id, 1.0, 0.02)).await.unwrap();
        let latest = store.latest(&id).await.unwrap();
        approx::assert_relative_eq!(latest.timestamp.as_secs_f64(), 1.0);
    }

    #[tokio::test]
    async fn range_is_inclusive_and_chronological() {
        let store = AnalyticsStore::new(TtlConfig::default());
        let id = StreamId::from("court-1");
        store.initialize(id.clone(), StreamSettings::default(), Timestamp::from_secs_f64(0.0)).await;
        for t in [1.0, 2.0, 3.0] {
            store.store(&id, record(&id, t, 0.01)).await.unwrap();
        }
        let rows = store
            .range(&id, Timestamp::from_secs_f64(1.0), Timestamp::from_secs_f64(2.0))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp.as_secs_f64() < rows[1].timestamp.as_secs_f64());
    }

    #[tokio::test]
    async fn store_on_unknown_stream_errors() {
        let store = AnalyticsStore::new(TtlConfig::default());
        let id = StreamId::from("ghost");
        let err = store.store(&id, record(&id, 0.0, 0.0)).await;
        assert!(matches!(err, Err(StoreError::UnknownStream(_))));
    }

    #[tokio::test]
    async fn cleanup_clears_history_but_preserves_summary_inactive() {
        let store = AnalyticsStore::new(TtlConfig::default());
        let id = StreamId::from("court-1");
        store.initialize(id.clone(), StreamSettings::default(), Timestamp::from_secs_f64(0.0)).await;
        store.store(&id, record(&id, 1.0, 0.02)).await.unwrap();
        store.cleanup(&id, Timestamp::from_secs_f64(10.0)).await.unwrap();

        assert!(store.latest(&id).await.is_none());
        let rows = store
            .range(&id, Timestamp::from_secs_f64(0.0), Timestamp::from_secs_f64(100.0))
            .await
            .unwrap();
        assert!(rows.is_empty());
        let summary = store.summary(&id).await.unwrap();
        assert_eq!(summary.status, SummaryStatus::Inactive);
        assert_eq!(summary.total_frames, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_clears_latest_after_its_ttl_elapses() {
        let ttl = TtlConfig {
            latest: Duration::from_secs(1),
            ..TtlConfig::default()
        };
        let store = Arc::new(AnalyticsStore::new(ttl));
        let id = StreamId::from("court-1");
        store.initialize(id.clone(), StreamSettings::default(), Timestamp::from_secs_f64(0.0)).await;
        store.store(&id, record(&id, 0.0, 0.01)).await.unwrap();
        assert!(store.latest(&id).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        store.sweep_once().await;
        assert!(store.latest(&id).await.is_none());
    }
}
