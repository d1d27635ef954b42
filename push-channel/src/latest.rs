use std::collections::HashMap;
use std::sync::Mutex;

use analytics_types::{AnalyticsRecord, StreamId};
use tokio::sync::watch;

/// Per-stream "latest record" channels. A `watch` sender only ever retains
/// the newest value, which gives coalescing-by-construction: a slow
/// subscriber misses intermediate frames rather than queuing them up.
#[derive(Default)]
pub struct LatestRegistry {
    senders: Mutex<HashMap<StreamId, watch::Sender<Option<AnalyticsRecord>>>>,
}

impl LatestRegistry {
    pub fn new() -> Self {
        LatestRegistry::default()
    }

    /// Publishes `record` as the new latest value for its stream, creating
    /// the channel on first use.
    pub fn publish(&self, record: AnalyticsRecord) {
        let mut senders = self.senders.lock().unwrap();
        match senders.get(&record.stream_id) {
            Some(tx) => {
                let _ = tx.send(Some(record));
            }
            None => {
                let stream_id = record.stream_id.clone();
                let (tx, _rx) = watch::channel(Some(record));
                senders.insert(stream_id, tx);
            }
        }
    }

    /// A receiver that always observes the most recently published record
    /// for `stream_id`, or `None` if nothing has been published yet.
    pub fn subscribe(&self, stream_id: &StreamId) -> watch::Receiver<Option<AnalyticsRecord>> {
        let mut senders = self.senders.lock().unwrap();
        senders
            .entry(stream_id.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::Timestamp;

    fn record(stream_id: &StreamId, frame_idx: u64) -> AnalyticsRecord {
        AnalyticsRecord {
            stream_id: stream_id.clone(),
            frame_idx,
            timestamp: Timestamp::from_secs_f64(frame_idx as f64),
            vibrio: None,
            moriarty: None,
            processing_time: 0.01,
            error: None,
        }
    }

    #[test]
    fn subscriber_sees_the_most_recently_published_record() {
        let registry = LatestRegistry::new();
        let id = StreamId::from("court-1");
        let mut rx = registry.subscribe(&id);
        registry.publish(record(&id, 1));
        registry.publish(record(&id, 2));
        rx.mark_changed();
        let latest = rx.borrow_and_update().clone().unwrap();
        assert_eq!(latest.frame_idx, 2);
    }

    #[test]
    fn a_stream_with_no_publish_yet_reports_none() {
        let registry = LatestRegistry::new();
        let id = StreamId::from("court-1");
        let rx = registry.subscribe(&id);
        assert!(rx.borrow().is_none());
    }
}
