use adskalman::{CovarianceUpdateMethod, ObservationModel, TransitionModelLinearNoControl};
use nalgebra::{Matrix4, OVector, U4};

use analytics_types::{Detection, TrackSummary};
use tracking::{hungarian_assignment, iou, BboxMotionModel, BboxObservationModel};

use crate::track::Track;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub iou_threshold: f64,
    pub min_hits: u32,
    pub max_age: u32,
    pub motion_noise_scale: f64,
    pub observation_noise_scale: f64,
    pub pixel_to_meter: f64,
    pub smoothing_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            iou_threshold: 0.3,
            min_hits: 3,
            max_age: 30,
            motion_noise_scale: 1.0,
            observation_noise_scale: 10.0,
            pixel_to_meter: 0.01,
            smoothing_window: 5,
        }
    }
}

/// Per-stream multi-object tracker: predict/associate/update/reap/emit over
/// a 2D constant-velocity, constant-scale-rate bounding-box Kalman filter.
pub struct Tracker {
    config: TrackerConfig,
    motion_model: BboxMotionModel<f64>,
    observation_model: BboxObservationModel<f64>,
    tracks: Vec<Track>,
    next_id: u64,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        let motion_model = BboxMotionModel::new(config.motion_noise_scale);
        let observation_model =
            BboxObservationModel::new(Matrix4::identity() * config.observation_noise_scale);
        Tracker {
            config,
            motion_model,
            observation_model,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn update_config(&mut self, config: TrackerConfig) {
        self.motion_model = BboxMotionModel::new(config.motion_noise_scale);
        self.observation_model =
            BboxObservationModel::new(Matrix4::identity() * config.observation_noise_scale);
        self.config = config;
    }

    /// Runs one predict/associate/update/reap/emit cycle for the detections
    /// observed in one frame, `dt` seconds after the previous call.
    pub fn step(&mut self, detections: &[Detection], dt: f64, fps: f64) -> Vec<TrackSummary> {
        self.predict(dt);
        let (matches, unmatched_tracks, unmatched_detections) = self.associate(detections);
        self.update_matched(&matches, detections);
        for &track_idx in &unmatched_tracks {
            self.tracks[track_idx].time_since_update += 1;
        }
        for &det_idx in &unmatched_detections {
            let d = &detections[det_idx];
            let track = Track::new(
                self.next_id,
                d.bbox,
                d.class_id,
                self.config.pixel_to_meter,
                fps,
                self.config.smoothing_window,
            );
            self.next_id += 1;
            self.tracks.push(track);
        }
        self.reap();
        for track in &mut self.tracks {
            track.refresh_speed();
        }
        self.emit()
    }

    fn predict(&mut self, dt: f64) {
        let fixed = self.motion_model.calc_for_dt(dt);
        for track in &mut self.tracks {
            track.estimate = fixed.predict(&track.estimate);
            track.age += 1;
        }
    }

    /// Returns `(matched (track_idx, detection_idx), unmatched_track_idx,
    /// unmatched_detection_idx)`, after the post-hoc `IoU > iou_threshold`
    /// gate that Hungarian assignment itself doesn't know about.
    fn associate(&self, detections: &[Detection]) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
        if self.tracks.is_empty() || detections.is_empty() {
            return (
                Vec::new(),
                (0..self.tracks.len()).collect(),
                (0..detections.len()).collect(),
            );
        }

        let cost: Vec<Vec<f64>> = self
            .tracks
            .iter()
            .map(|track| {
                let track_bbox = track.bbox();
                detections
                    .iter()
                    .enumerate()
                    .map(|(j, d)| {
                        let overlap = iou(track_bbox, d.bbox);
                        // Tiny tie-break nudge: among equal-IoU candidates,
                        // prefer higher confidence, then lower index. Far
                        // smaller than any real IoU difference (1e-4 steps).
                        (1.0 - overlap) - 1e-6 * d.confidence - 1e-9 * (detections.len() - j) as f64
                    })
                    .collect()
            })
            .collect();

        let raw_matches = hungarian_assignment(&cost);

        let mut matched_tracks = vec![false; self.tracks.len()];
        let mut matched_detections = vec![false; detections.len()];
        let mut matches = Vec::new();
        for (track_idx, det_idx) in raw_matches {
            let overlap = iou(self.tracks[track_idx].bbox(), detections[det_idx].bbox);
            if overlap > self.config.iou_threshold {
                matched_tracks[track_idx] = true;
                matched_detections[det_idx] = true;
                matches.push((track_idx, det_idx));
            }
        }

        let unmatched_tracks = (0..self.tracks.len()).filter(|&i| !matched_tracks[i]).collect();
        let unmatched_detections = (0..detections.len())
            .filter(|&j| !matched_detections[j])
            .collect();
        (matches, unmatched_tracks, unmatched_detections)
    }

    fn update_matched(&mut self, matches: &[(usize, usize)], detections: &[Detection]) {
        for &(track_idx, det_idx) in matches {
            let d = &detections[det_idx];
            let cx = (d.bbox[0] + d.bbox[2]) / 2.0;
            let cy = (d.bbox[1] + d.bbox[3]) / 2.0;
            let w = (d.bbox[2] - d.bbox[0]).max(1.0);
            let h = (d.bbox[3] - d.bbox[1]).max(1.0);
            let observation = OVector::<f64, U4>::new(cx, cy, w, h);

            let track = &mut self.tracks[track_idx];
            match self.observation_model.update(
                &track.estimate,
                &observation,
                CovarianceUpdateMethod::JosephForm,
            ) {
                Ok(posterior) => {
                    track.estimate = posterior;
                    track.hits += 1;
                    track.time_since_update = 0;
                }
                Err(e) => {
                    // Degenerate innovation covariance: never fatal, the
                    // track simply keeps its predicted state this frame.
                    tracing::warn!(track_id = track.id, error = %e, "kalman update failed, keeping predicted state");
                    track.time_since_update += 1;
                }
            }
        }
    }

    fn reap(&mut self) {
        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.time_since_update <= max_age);
    }

    fn emit(&self) -> Vec<TrackSummary> {
        self.tracks
            .iter()
            .filter(|t| t.hits >= self.config.min_hits || t.time_since_update == 0)
            .map(|t| analytics_types::TrackSummary {
                track_id: t.id,
                position: analytics_types::Point2 {
                    x: t.center().0,
                    y: t.center().1,
                },
                speed: t.last_speed,
                age: t.age,
                bbox: t.bbox(),
            })
            .collect()
    }

    pub fn active_track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(bbox: [f64; 4]) -> Detection {
        Detection {
            bbox,
            confidence: 0.9,
            class_id: 0,
        }
    }

    #[test]
    fn a_new_detection_creates_a_track_but_is_not_emitted_until_min_hits() {
        let mut tracker = Tracker::new(TrackerConfig {
            min_hits: 3,
            ..Default::default()
        });
        let det = detection([0.0, 0.0, 80.0, 160.0]);

        let summaries = tracker.step(std::slice::from_ref(&det), 1.0 / 30.0, 30.0);
        // not emitted yet (hits=1 < min_hits=3) but time_since_update==0 so it IS emitted
        assert_eq!(summaries.len(), 1);
        assert_eq!(tracker.active_track_count(), 1);
    }

    #[test]
    fn a_consistently_matched_track_keeps_the_same_id_across_frames() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let mut bbox = [0.0, 0.0, 80.0, 160.0];
        let first = tracker.step(&[detection(bbox)], 1.0 / 30.0, 30.0);
        let id = first[0].track_id;

        for _ in 0..5 {
            bbox[0] += 1.0;
            bbox[2] += 1.0;
            let summaries = tracker.step(&[detection(bbox)], 1.0 / 30.0, 30.0);
            assert_eq!(summaries.len(), 1);
            assert_eq!(summaries[0].track_id, id);
        }
    }

    #[test]
    fn an_unmatched_track_is_reaped_after_max_age() {
        let mut tracker = Tracker::new(TrackerConfig {
            max_age: 2,
            ..Default::default()
        });
        tracker.step(&[detection([0.0, 0.0, 80.0, 160.0])], 1.0 / 30.0, 30.0);
        assert_eq!(tracker.active_track_count(), 1);

        for _ in 0..4 {
            tracker.step(&[], 1.0 / 30.0, 30.0);
        }
        assert_eq!(tracker.active_track_count(), 0);
    }

    #[test]
    fn far_apart_detection_and_track_do_not_match() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let first = tracker.step(&[detection([0.0, 0.0, 80.0, 160.0])], 1.0 / 30.0, 30.0);
        let id = first[0].track_id;

        let summaries = tracker.step(&[detection([900.0, 900.0, 980.0, 1060.0])], 1.0 / 30.0, 30.0);
        // the far detection spawns a new track; the old one goes unmatched and, with
        // hits still below min_hits, drops out of this frame's emitted set
        assert!(summaries.iter().any(|s| s.track_id != id));
    }
}
