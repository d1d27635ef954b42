use crate::Timestamp;

/// Lifecycle marker carried on a `Summary`, distinct from `StreamState`:
/// a summary survives `cleanup` (marked `inactive`) even after the
/// registry has forgotten the stream's live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Active,
    Inactive,
}

/// Running counters and averages for one stream, created with zero values
/// by `initialize` and mutated on every `store` call thereafter.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub status: SummaryStatus,
    pub started_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ended_at: Option<Timestamp>,
    pub total_frames: u64,
    pub total_detections: u64,
    pub avg_processing_time: f64,
    pub detection_rate: f64,
    pub pose_rate: f64,
    pub error_rate: f64,
    pub avg_fps: f64,
    pub max_speed: f64,
}

impl Summary {
    pub fn new(started_at: Timestamp) -> Self {
        Summary {
            status: SummaryStatus::Active,
            started_at,
            ended_at: None,
            total_frames: 0,
            total_detections: 0,
            avg_processing_time: 0.0,
            detection_rate: 0.0,
            pose_rate: 0.0,
            error_rate: 0.0,
            avg_fps: 0.0,
            max_speed: 0.0,
        }
    }

    /// Folds one more processed record into the running counters.
    ///
    /// `detected`/`posed`/`errored` are booleans for this frame; the three
    /// rate fields use the corrected running-average formula
    /// `new = (old * (n - 1) + indicator) / n` rather than the original's
    /// divide-after-increment bug.
    pub fn record(
        &mut self,
        detection_count: u64,
        detected: bool,
        posed: bool,
        errored: bool,
        processing_time: f64,
        max_track_speed: f64,
    ) {
        self.total_frames += 1;
        self.total_detections += detection_count;
        let n = self.total_frames as f64;

        self.avg_processing_time = running_average(self.avg_processing_time, n, processing_time);
        self.detection_rate = running_average(self.detection_rate, n, bool_to_f64(detected));
        self.pose_rate = running_average(self.pose_rate, n, bool_to_f64(posed));
        self.error_rate = running_average(self.error_rate, n, bool_to_f64(errored));

        // The reciprocal of the mean processing time, not the mean of the
        // per-frame reciprocals — those diverge, and only the former
        // matches `total_frames / total_processing_time`.
        if self.avg_processing_time > 0.0 {
            self.avg_fps = 1.0 / self.avg_processing_time;
        }

        self.max_speed = self.max_speed.max(max_track_speed);
    }

    pub fn mark_inactive(&mut self, ended_at: Timestamp) {
        self.status = SummaryStatus::Inactive;
        self.ended_at = Some(ended_at);
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// `new = (old * (n - 1) + sample) / n`, the corrected form of the
/// running average (the original divides by the already-incremented count
/// a second time, double-counting the new sample).
fn running_average(old: f64, n: f64, sample: f64) -> f64 {
    (old * (n - 1.0) + sample) / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_processing_time_and_fps_after_three_records() {
        let mut summary = Summary::new(Timestamp::from_secs_f64(0.0));
        for pt in [0.10, 0.20, 0.30] {
            summary.record(0, false, false, false, pt, 0.0);
        }
        approx::assert_relative_eq!(summary.avg_processing_time, 0.20, max_relative = 1e-9);
        approx::assert_relative_eq!(summary.avg_fps, 5.0, max_relative = 1e-9);
        assert_eq!(summary.total_frames, 3);
    }

    #[test]
    fn total_frames_counts_store_calls() {
        let mut summary = Summary::new(Timestamp::from_secs_f64(0.0));
        summary.record(2, true, false, false, 0.01, 5.0);
        summary.record(0, false, false, true, 0.01, 0.0);
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.total_detections, 2);
        approx::assert_relative_eq!(summary.detection_rate, 0.5);
        approx::assert_relative_eq!(summary.error_rate, 0.5);
        approx::assert_relative_eq!(summary.max_speed, 5.0);
    }

    #[test]
    fn mark_inactive_preserves_counters() {
        let mut summary = Summary::new(Timestamp::from_secs_f64(0.0));
        summary.record(1, true, true, false, 0.05, 3.0);
        summary.mark_inactive(Timestamp::from_secs_f64(100.0));
        assert_eq!(summary.status, SummaryStatus::Inactive);
        assert_eq!(summary.total_frames, 1);
        assert!(summary.ended_at.is_some());
    }
}
