use analytics_types::{Detection, Frame};
use motion_features::{compute_connected_components, Region};

use crate::error::Result;

/// `detect(frame) -> list<Detection>`, filtered to the person class with
/// `confidence >= conf_threshold`. A real implementation wraps an
/// external object-detection model; the model itself is out of scope
/// here, so any conforming implementation may be substituted.
pub trait DetectorAdapter: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Reference class id this system treats as "person"; the only class the
/// tracker and pipeline downstream of the detector ever see.
pub const PERSON_CLASS_ID: u32 = 0;

/// Typical pixel area of a standing adult at the frame scale this system
/// targets, used only to turn a blob's pixel area into a confidence score.
const REFERENCE_PERSON_AREA_PX: f64 = 80.0 * 160.0;

const DIFF_THRESHOLD: i16 = 25;
const MIN_BLOB_AREA: usize = 150;

/// Deterministic, model-free detector: treats connected components of the
/// frame-difference motion mask as person candidates. Lets the tracker and
/// the rest of the pipeline be exercised end to end without a real ML
/// model, while leaving `DetectorAdapter` open for one to be swapped in.
pub struct MotionBlobDetector {
    conf_threshold: f64,
    prev_luma: Option<Vec<u8>>,
    dims: (u32, u32),
}

impl MotionBlobDetector {
    pub fn new(conf_threshold: f64) -> Self {
        MotionBlobDetector {
            conf_threshold,
            prev_luma: None,
            dims: (0, 0),
        }
    }

    fn regions(&mut self, frame: &Frame) -> Vec<Region> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        let curr_luma: Vec<u8> = (0..frame.height)
            .flat_map(|y| (0..frame.width).map(move |x| (x, y)))
            .map(|(x, y)| frame.luma_at(x, y))
            .collect();

        let regions = match &self.prev_luma {
            Some(prev) if self.dims == (frame.width, frame.height) => {
                let mut mask = vec![false; width * height];
                for y in 0..frame.height {
                    for x in 0..frame.width {
                        let idx = y as usize * width + x as usize;
                        let a = prev[idx] as i16;
                        let b = curr_luma[idx] as i16;
                        if (a - b).abs() > DIFF_THRESHOLD {
                            mask[idx] = true;
                        }
                    }
                }
                compute_connected_components(&mask, width, height, MIN_BLOB_AREA)
            }
            _ => Vec::new(),
        };

        self.prev_luma = Some(curr_luma);
        self.dims = (frame.width, frame.height);
        regions
    }
}

impl DetectorAdapter for MotionBlobDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let regions = self.regions(frame);
        let detections = regions
            .into_iter()
            .filter_map(|r| {
                let confidence = (r.area_px as f64 / REFERENCE_PERSON_AREA_PX).min(1.0);
                if confidence < self.conf_threshold {
                    return None;
                }
                Some(Detection {
                    bbox: r.bbox,
                    confidence,
                    class_id: PERSON_CLASS_ID,
                })
            })
            .collect::<Vec<_>>();
        tracing::trace!(count = detections.len(), "motion blob detections");
        Ok(detections)
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
    fn no_detections_on_the_first_frame() {
        let mut detector = MotionBlobDetector::new(0.0);
        let frame = frame_with_square(100, 100, 220, Some((50, 50, 40)));
        let detections = detector.detect(&frame).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn a_moved_block_is_detected_as_one_person_candidate() {
        let mut detector = MotionBlobDetector::new(0.0);
        detector.detect(&frame_with_square(100, 100, 30, None)).unwrap();
        let detections = detector
            .detect(&frame_with_square(100, 100, 220, Some((50, 50, 40))))
            .unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, PERSON_CLASS_ID);
        assert!(detections[0].confidence > 0.0);
    }

    #[test]
    fn confidence_threshold_filters_small_blobs() {
        let mut detector = MotionBlobDetector::new(0.9);
        detector.detect(&frame_with_square(100, 100, 30, None)).unwrap();
        let detections = detector
            .detect(&frame_with_square(100, 100, 220, Some((50, 50, 15))))
            .unwrap();
        assert!(detections.is_empty());
    }
}
