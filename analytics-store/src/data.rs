use std::collections::BTreeMap;
use std::time::Instant;

use analytics_types::{AnalyticsRecord, StreamSettings, Summary};

/// Everything kept for one stream. Each of the three TTL-governed pieces
/// (history, latest, settings-carrying "state") tracks its own last-write
/// instant so the background sweeper can expire them independently; the
/// summary itself is never swept, only marked inactive by `cleanup`.
pub struct StreamData {
    pub history: BTreeMap<u64, AnalyticsRecord>,
    pub history_touched_at: Instant,
    pub latest: Option<AnalyticsRecord>,
    pub latest_touched_at: Instant,
    pub settings: Option<StreamSettings>,
    pub state_touched_at: Instant,
    pub summary: Summary,
}

impl StreamData {
    pub fn new(settings: StreamSettings, summary: Summary) -> Self {
        let now = Instant::now();
        StreamData {
            history: BTreeMap::new(),
            history_touched_at: now,
            latest: None,
            latest_touched_at: now,
            settings: Some(settings),
            state_touched_at: now,
            summary,
        }
    }
}
