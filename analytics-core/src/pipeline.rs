use std::time::{Duration, Instant};

use analytics_types::{
    AnalyticsRecord, Biomechanics, Frame, FrameStats, MoriartyData, StreamId, Timestamp, VibrioData,
};
use kinematics::{KinematicsConfig, KinematicsEngine, StrideAndGrf};
use motion_features::{compute_motion_energy, SparseOpticalFlowTracker};
use vision_adapters::{DetectorAdapter, PoseAdapter};

use crate::tracker::{Tracker, TrackerConfig};

/// Per-stream frame pipeline: fans out to the tracker branch and the pose
/// branch in parallel, joins with a per-frame deadline, and always emits
/// exactly one `AnalyticsRecord`. A failed or timed-out branch becomes a
/// `None` field plus an `error` note rather than aborting the frame.
pub struct FramePipeline {
    stream_id: StreamId,
    detector: Box<dyn DetectorAdapter>,
    pose_adapter: Box<dyn PoseAdapter>,
    tracker: Tracker,
    kinematics: KinematicsEngine,
    optical_flow: SparseOpticalFlowTracker,
    prev_frame: Option<Frame>,
    fps: f64,
    prev_timestamp: Option<Timestamp>,
    latest_stride_and_grf: Option<StrideAndGrf>,
}

impl FramePipeline {
    pub fn new(
        stream_id: StreamId,
        detector: Box<dyn DetectorAdapter>,
        pose_adapter: Box<dyn PoseAdapter>,
        tracker_config: TrackerConfig,
        kinematics_config: KinematicsConfig,
        fps: f64,
    ) -> Self {
        FramePipeline {
            stream_id,
            detector,
            pose_adapter,
            tracker: Tracker::new(tracker_config),
            kinematics: KinematicsEngine::new(kinematics_config),
            optical_flow: SparseOpticalFlowTracker::new(),
            prev_frame: None,
            fps,
            prev_timestamp: None,
            latest_stride_and_grf: None,
        }
    }

    pub fn latest_stride_and_grf(&self) -> Option<&StrideAndGrf> {
        self.latest_stride_and_grf.as_ref()
    }

    /// Processes exactly one frame, respecting a per-frame deadline of one
    /// frame period at the stream's target FPS.
    pub async fn process(&mut self, frame: &Frame) -> AnalyticsRecord {
        let start = Instant::now();
        let dt = match self.prev_timestamp {
            Some(prev) => (frame.timestamp.as_secs_f64() - prev.as_secs_f64()).max(1e-6),
            None => 1.0 / self.fps.max(1e-6),
        };
        self.prev_timestamp = Some(frame.timestamp);
        let deadline = Duration::from_secs_f64(1.0 / self.fps.max(1e-6));

        let prev_frame = self.prev_frame.take();
        let detector = &mut self.detector;
        let tracker = &mut self.tracker;
        let optical_flow = &mut self.optical_flow;
        let pose_adapter = &mut self.pose_adapter;
        let kinematics = &mut self.kinematics;

        let vibrio_branch = tokio::time::timeout(
            deadline,
            run_vibrio_branch(detector.as_mut(), tracker, optical_flow, prev_frame.as_ref(), frame, dt, self.fps),
        );
        let moriarty_branch = tokio::time::timeout(deadline, run_moriarty_branch(pose_adapter.as_mut(), kinematics, frame));

        let (vibrio_result, moriarty_result) = tokio::join!(vibrio_branch, moriarty_branch);

        let mut errors = Vec::new();

        let vibrio = match vibrio_result {
            Ok(Ok(data)) => Some(data),
            Ok(Err(e)) => {
                errors.push(format!("vibrio: {e}"));
                None
            }
            Err(_) => {
                errors.push("vibrio: frame deadline exceeded".to_string());
                None
            }
        };

        let moriarty = match moriarty_result {
            Ok(Ok((data, stride_and_grf))) => {
                self.latest_stride_and_grf = stride_and_grf;
                Some(data)
            }
            Ok(Err(e)) => {
                errors.push(format!("moriarty: {e}"));
                None
            }
            Err(_) => {
                errors.push("moriarty: frame deadline exceeded".to_string());
                None
            }
        };

        self.prev_frame = Some(frame.clone());

        AnalyticsRecord {
            stream_id: self.stream_id.clone(),
            frame_idx: frame.frame_idx,
            timestamp: frame.timestamp,
            vibrio,
            moriarty,
            processing_time: start.elapsed().as_secs_f64(),
            error: if errors.is_empty() { None } else { Some(errors.join("; ")) },
        }
    }
}

async fn run_vibrio_branch(
    detector: &mut dyn DetectorAdapter,
    tracker: &mut Tracker,
    optical_flow: &mut SparseOpticalFlowTracker,
    prev_frame: Option<&Frame>,
    frame: &Frame,
    dt: f64,
    fps: f64,
) -> Result<VibrioData, crate::error::CoreError> {
    let detections = detector
        .detect(frame)
        .map_err(|e| crate::error::CoreError::Detector(e.to_string()))?;

    let tracks = tracker.step(&detections, dt, fps);

    let motion_energy = match prev_frame {
        Some(prev) => compute_motion_energy(prev, frame),
        None => Default::default(),
    };
    let optical = optical_flow.track(frame);

    let avg_confidence = if detections.is_empty() {
        0.0
    } else {
        detections.iter().map(|d| d.confidence).sum::<f64>() / detections.len() as f64
    };

    Ok(VibrioData {
        frame_stats: FrameStats {
            detection_count: detections.len(),
            track_count: tracks.len(),
            avg_confidence,
        },
        detections,
        tracks,
        motion_energy,
        optical_flow: optical,
    })
}

async fn run_moriarty_branch(
    pose_adapter: &mut dyn PoseAdapter,
    kinematics: &mut KinematicsEngine,
    frame: &Frame,
) -> Result<(MoriartyData, Option<StrideAndGrf>), crate::error::CoreError> {
    let pose = pose_adapter
        .extract(frame)
        .map_err(|e| crate::error::CoreError::Pose(e.to_string()))?;

    match pose {
        Some(pose) => {
            let pose_quality_score = pose.quality_score();
            let landmarks = pose.landmarks.clone();
            let (biomechanics, stride_and_grf) = kinematics.push(pose);
            Ok((
                MoriartyData {
                    pose_detected: true,
                    landmarks,
                    biomechanics,
                    pose_quality_score,
                },
                Some(stride_and_grf),
            ))
        }
        None => Ok((
            MoriartyData {
                pose_detected: false,
                landmarks: Default::default(),
                biomechanics: Biomechanics::default(),
                pose_quality_score: 0.0,
            },
            None,
        )),
    }
}
