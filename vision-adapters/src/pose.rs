use std::collections::HashMap;

use analytics_types::{Frame, Landmark, LandmarkName, Pose};
use motion_features::{compute_connected_components, Region};

use crate::error::Result;

/// `extract(frame) -> Pose | None`. Landmarks carry pixel coordinates and
/// visibility. Implementations are stateful across frames (for tracking
/// continuity) but must never be shared between streams: each stream owns
/// exactly one instance.
///
/// Deliberately not `Sync` — the pipeline holds this behind an owned
/// `Box<dyn PoseAdapter>` per stream, never behind a shared reference, so
/// the type system rules out accidental cross-stream sharing.
pub trait PoseAdapter: Send {
    fn extract(&mut self, frame: &Frame) -> Result<Option<Pose>>;
}

const DIFF_THRESHOLD: i16 = 25;
const MIN_SUBJECT_AREA: usize = 150;

/// Deterministic stub: locates the largest frame-difference blob and lays
/// a fixed humanoid landmark template over its bounding box. Exercises
/// kinematics end to end without a real pose model.
pub struct TemplatePoseAdapter {
    prev_luma: Option<Vec<u8>>,
    dims: (u32, u32),
}

impl Default for TemplatePoseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplatePoseAdapter {
    pub fn new() -> Self {
        TemplatePoseAdapter {
            prev_luma: None,
            dims: (0, 0),
        }
    }

    fn largest_subject(&mut self, frame: &Frame) -> Option<Region> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        let curr_luma: Vec<u8> = (0..frame.height)
            .flat_map(|y| (0..frame.width).map(move |x| (x, y)))
            .map(|(x, y)| frame.luma_at(x, y))
            .collect();

        let subject = match &self.prev_luma {
            Some(prev) if self.dims == (frame.width, frame.height) => {
                let mut mask = vec![false; width * height];
                for y in 0..frame.height {
                    for x in 0..frame.width {
                        let idx = y as usize * width + x as usize;
                        if (prev[idx] as i16 - curr_luma[idx] as i16).abs() > DIFF_THRESHOLD {
                            mask[idx] = true;
                        }
                    }
                }
                compute_connected_components(&mask, width, height, MIN_SUBJECT_AREA)
                    .into_iter()
                    .max_by_key(|r| r.area_px)
            }
            _ => None,
        };

        self.prev_luma = Some(curr_luma);
        self.dims = (frame.width, frame.height);
        subject
    }
}

impl PoseAdapter for TemplatePoseAdapter {
    fn extract(&mut self, frame: &Frame) -> Result<Option<Pose>> {
        let Some(region) = self.largest_subject(frame) else {
            return Ok(None);
        };

        let [x0, y0, x1, y1] = region.bbox;
        let w = x1 - x0;
        let h = y1 - y0;
        let visibility = (region.area_px as f64 / 4000.0).clamp(0.3, 1.0);

        let at = |fx: f64, fy: f64| Landmark {
            x: x0 + fx * w,
            y: y0 + fy * h,
            visibility,
        };

        let mut landmarks = HashMap::new();
        landmarks.insert(LandmarkName::LeftShoulder.to_string(), at(0.30, 0.18));
        landmarks.insert(LandmarkName::RightShoulder.to_string(), at(0.70, 0.18));
        landmarks.insert(LandmarkName::LeftElbow.to_string(), at(0.18, 0.38));
        landmarks.insert(LandmarkName::RightElbow.to_string(), at(0.82, 0.38));
        landmarks.insert(LandmarkName::LeftWrist.to_string(), at(0.12, 0.55));
        landmarks.insert(LandmarkName::RightWrist.to_string(), at(0.88, 0.55));
        landmarks.insert(LandmarkName::LeftHip.to_string(), at(0.38, 0.55));
        landmarks.insert(LandmarkName::RightHip.to_string(), at(0.62, 0.55));
        landmarks.insert(LandmarkName::LeftKnee.to_string(), at(0.36, 0.78));
        landmarks.insert(LandmarkName::RightKnee.to_string(), at(0.64, 0.78));
        landmarks.insert(LandmarkName::LeftAnkle.to_string(), at(0.35, 0.98));
        landmarks.insert(LandmarkName::RightAnkle.to_string(), at(0.65, 0.98));

        Ok(Some(Pose {
            frame_idx: frame.frame_idx,
            landmarks,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::{StreamId, Timestamp};

    fn frame_with_square(width: u32, height: u32, value: u8, square: Option<(u32, u32, u32)>) -> Frame {
        let mut pixels = vec![30u8; 3 * width as usize * height as usize];
        if let Some((cx, cy, half)) = square {
            for y in cy.saturating_sub(half)..(cy + half).min(height) {
                for x in cx.saturating_sub(half)..(cx + half).min(width) {
                    let idx = 3 * (y as usize * width as usize + x as usize);
                    pixels[idx] = value;
                    pixels[idx + 1] = value;
                    pixels[idx + 2] = value;
                }
            }
        }
        Frame::new(StreamId::from("s"), 0, Timestamp::from_secs_f64(0.0), width, height, pixels)
    }

    #[test]
    fn no_pose_on_first_frame_or_static_scene() {
        let mut adapter = TemplatePoseAdapter::new();
        assert!(adapter
            .extract(&frame_with_square(100, 100, 220, Some((50, 50, 40))))
            .unwrap()
            .is_none());
    }

    #[test]
    fn template_pose_has_all_twelve_landmarks_once_a_subject_moves() {
        let mut adapter = TemplatePoseAdapter::new();
        adapter.extract(&frame_with_square(100, 100, 30, None)).unwrap();
        let pose = adapter
            .extract(&frame_with_square(100, 100, 220, Some((50, 50, 40))))
            .unwrap()
            .expect("subject moved, pose expected");
        assert_eq!(pose.landmarks.len(), 12);
        assert!(pose.landmark(LandmarkName::LeftKnee).is_some());
    }
}
