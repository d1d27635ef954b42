use analytics_types::{Frame, OpticalFlow};

/// Half-width of the window used to solve the Lucas-Kanade normal
/// equations around each tracked point.
const WINDOW_RADIUS: i32 = 3;

/// Spacing, in pixels, between seeded feature points on the tracking grid.
const GRID_SPACING: u32 = 24;

/// Re-seed the feature set every this many frames, per the sparse
/// Lucas-Kanade design (features drift and need periodic replacement).
const RESEED_INTERVAL: u32 = 30;

/// Sparse Lucas-Kanade feature tracker. Stateful across frames of one
/// stream; never shared between streams.
pub struct SparseOpticalFlowTracker {
    frames_since_seed: u32,
    prev_luma: Option<Vec<u8>>,
    dims: (u32, u32),
    points: Vec<(f64, f64)>,
}

impl Default for SparseOpticalFlowTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseOpticalFlowTracker {
    pub fn new() -> Self {
        SparseOpticalFlowTracker {
            frames_since_seed: 0,
            prev_luma: None,
            dims: (0, 0),
            points: Vec::new(),
        }
    }

    fn seed_grid(&mut self, width: u32, height: u32) {
        self.points.clear();
        let margin = (WINDOW_RADIUS as u32) + 1;
        let mut y = margin;
        while y + margin < height {
            let mut x = margin;
            while x + margin < width {
                self.points.push((x as f64, y as f64));
                x += GRID_SPACING;
            }
            y += GRID_SPACING;
        }
        self.frames_since_seed = 0;
    }

    /// Feeds one more frame and returns the aggregate flow statistics
    /// since the previous call.
    pub fn track(&mut self, frame: &Frame) -> OpticalFlow {
        let width = frame.width;
        let height = frame.height;
        let curr_luma: Vec<u8> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| frame.luma_at(x, y))
            .collect();

        let result = match &self.prev_luma {
            None => OpticalFlow::default(),
            Some(prev_luma) if self.dims == (width, height) => {
                if self.points.is_empty() || self.frames_since_seed >= RESEED_INTERVAL {
                    self.seed_grid(width, height);
                }
                let vectors = self.track_points(prev_luma, &curr_luma, width, height);
                aggregate(&vectors)
            }
            Some(_) => {
                // Dimensions changed (quality tier switch): drop state, reseed next frame.
                OpticalFlow::default()
            }
        };

        if self.dims != (width, height) {
            self.points.clear();
        }
        self.prev_luma = Some(curr_luma);
        self.dims = (width, height);
        self.frames_since_seed += 1;
        result
    }

    fn track_points(
        &mut self,
        prev: &[u8],
        curr: &[u8],
        width: u32,
        height: u32,
    ) -> Vec<(f64, f64)> {
        let w = width as i32;
        let h = height as i32;
        let r = WINDOW_RADIUS;
        let mut vectors = Vec::with_capacity(self.points.len());
        let mut surviving = Vec::with_capacity(self.points.len());

        for &(px, py) in &self.points {
            let cx = px.round() as i32;
            let cy = py.round() as i32;
            if cx - r - 1 < 0 || cy - r - 1 < 0 || cx + r + 1 >= w || cy + r + 1 >= h {
                continue;
            }

            let mut sum_ixx = 0.0_f64;
            let mut sum_iyy = 0.0_f64;
            let mut sum_ixy = 0.0_f64;
            let mut sum_ixt = 0.0_f64;
            let mut sum_iyt = 0.0_f64;

            for dy in -r..=r {
                for dx in -r..=r {
                    let x = cx + dx;
                    let y = cy + dy;
                    let idx = (y * w + x) as usize;
                    let ix = (prev[idx + 1] as f64 - prev[idx - 1] as f64) / 2.0;
                    let iy = (prev[(y as usize + 1) * width as usize + x as usize] as f64
                        - prev[(y as usize - 1) * width as usize + x as usize] as f64)
                        / 2.0;
                    let it = curr[idx] as f64 - prev[idx] as f64;

                    sum_ixx += ix * ix;
                    sum_iyy += iy * iy;
                    sum_ixy += ix * iy;
                    sum_ixt += ix * it;
                    sum_iyt += iy * it;
                }
            }

            let det = sum_ixx * sum_iyy - sum_ixy * sum_ixy;
            if det.abs() < 1e-6 {
                // Aperture problem: textureless patch, can't solve. Point
                // survives but contributes no flow vector this frame.
                surviving.push((px, py));
                continue;
            }

            let u = (-sum_iyy * sum_ixt + sum_ixy * sum_iyt) / det;
            let v = (sum_ixy * sum_ixt - sum_ixx * sum_iyt) / det;

            vectors.push((u, v));
            surviving.push((px + u, py + v));
        }

        self.points = surviving;
        vectors
    }
}

fn aggregate(vectors: &[(f64, f64)]) -> OpticalFlow {
    if vectors.is_empty() {
        return OpticalFlow::default();
    }
    let n = vectors.len() as f64;
    let mean_u = vectors.iter().map(|(u, _)| u).sum::<f64>() / n;
    let mean_v = vectors.iter().map(|(_, v)| v).sum::<f64>() / n;
    let mean_magnitude = vectors
        .iter()
        .map(|(u, v)| (u * u + v * v).sqrt())
        .sum::<f64>()
        / n;

    OpticalFlow {
        mean_magnitude,
        mean_direction: mean_v.atan2(mean_u),
        motion_intensity: (mean_magnitude / 255.0).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::{StreamId, Timestamp};

    fn checkerboard(width: u32, height: u32, shift: i32) -> Frame {
        let mut pixels = vec![0u8; 3 * width as usize * height as usize];
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let sx = x - shift;
                let on = ((sx.div_euclid(8)) + (y.div_euclid(8))) % 2 == 0;
                let v = if on { 220u8 } else { 20u8 };
                let idx = 3 * (y as usize * width as usize + x as usize);
                pixels[idx] = v;
                pixels[idx + 1] = v;
                pixels[idx + 2] = v;
            }
        }
        Frame::new(StreamId::from("s"), 0, Timestamp::from_secs_f64(0.0), width, height, pixels)
    }

    #[test]
    fn first_frame_reports_zero_flow() {
        let mut tracker = SparseOpticalFlowTracker::new();
        let flow = tracker.track(&checkerboard(64, 64, 0));
        approx::assert_relative_eq!(flow.mean_magnitude, 0.0);
    }

    #[test]
    fn stationary_scene_reports_near_zero_magnitude() {
        let mut tracker = SparseOpticalFlowTracker::new();
        tracker.track(&checkerboard(64, 64, 0));
        let flow = tracker.track(&checkerboard(64, 64, 0));
        assert!(flow.mean_magnitude < 0.2);
    }

    #[test]
    fn motion_intensity_stays_in_unit_range() {
        let mut tracker = SparseOpticalFlowTracker::new();
        tracker.track(&checkerboard(64, 64, 0));
        let flow = tracker.track(&checkerboard(64, 64, 3));
        assert!((0.0..=1.0).contains(&flow.motion_intensity));
    }
}
