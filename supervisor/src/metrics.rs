use analytics_types::StreamId;

/// One snapshot of a single stream's operating metrics, assembled by the
/// metrics-collection loop and consumed by the decision loop.
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    pub stream_id: StreamId,
    pub viewer_count: u64,
    pub analytics_fps: f64,
    pub detection_rate: f64,
    pub pose_detection_rate: f64,
    pub error_rate: f64,
    pub betting_activity: u64,
}

/// System-wide thresholds the decision loop applies in order.
#[derive(Debug, Clone, Copy)]
pub struct DecisionThresholds {
    pub max_concurrent_streams: usize,
    pub min_analytics_fps: f64,
    pub max_error_rate: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        DecisionThresholds {
            max_concurrent_streams: 10,
            min_analytics_fps: 15.0,
            max_error_rate: 0.05,
        }
    }
}

/// One row of the bounded system-metrics time series.
#[derive(Debug, Clone)]
pub struct MetricsRow {
    pub stream_id: StreamId,
    pub viewer_count: u64,
    pub analytics_fps: f64,
    pub error_rate: f64,
    pub betting_activity: u64,
}

/// A fixed-capacity time series of metrics rows; oldest rows drop once full,
/// matching spec's "bounded to 1000 rows".
pub struct MetricsLog {
    rows: std::collections::VecDeque<MetricsRow>,
    capacity: usize,
}

impl MetricsLog {
    pub fn new(capacity: usize) -> Self {
        MetricsLog {
            rows: std::collections::VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, row: MetricsRow) {
        if self.rows.len() == self.capacity {
            self.rows.pop_front();
        }
        self.rows.push_back(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &MetricsRow> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: u64) -> MetricsRow {
        MetricsRow {
            stream_id: StreamId::from(format!("s{n}")),
            viewer_count: n,
            analytics_fps: 30.0,
            error_rate: 0.0,
            betting_activity: 0,
        }
    }

    #[test]
    fn oldest_row_drops_once_capacity_is_exceeded() {
        let mut log = MetricsLog::new(2);
        log.push(row(1));
        log.push(row(2));
        log.push(row(3));
        assert_eq!(log.len(), 2);
        let ids: Vec<_> = log.rows().map(|r| r.viewer_count).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
