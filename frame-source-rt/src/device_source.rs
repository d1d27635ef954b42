use analytics_types::{Frame, QualityTier, StreamId, Timestamp};

use crate::error::SourceError;
use crate::quality::downscale_to_tier;
use crate::rate_limit::RateLimiter;
use crate::source::{FrameEvent, FrameSource};

/// Abstraction over a local capture device (webcam). Hardware access and
/// driver negotiation are out of scope; this trait is the seam a real
/// V4L2/AVFoundation backend would implement.
pub trait DeviceReader: Send {
    fn grab(&mut self) -> Result<(u32, u32, Vec<u8>), SourceError>;
}

pub struct DeviceSource<R: DeviceReader> {
    stream_id: StreamId,
    reader: R,
    rate_limiter: RateLimiter,
    quality_tier: QualityTier,
    fps: f64,
    frame_idx: u64,
    closed: bool,
}

impl<R: DeviceReader> DeviceSource<R> {
    pub fn new(stream_id: StreamId, reader: R, target_fps: f64, quality_tier: QualityTier) -> Self {
        DeviceSource {
            stream_id,
            reader,
            rate_limiter: RateLimiter::new(target_fps),
            quality_tier,
            fps: target_fps,
            frame_idx: 0,
            closed: false,
        }
    }
}

impl<R: DeviceReader> FrameSource for DeviceSource<R> {
    fn next(&mut self) -> Result<FrameEvent, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }
        let (width, height, pixels) = self.reader.grab()?;
        if !self.rate_limiter.admit(std::time::Instant::now()) {
            return self.next();
        }
        let (w, h, pixels) = downscale_to_tier(width, height, &pixels, self.quality_tier);
        let timestamp = Timestamp::from_secs_f64(self.frame_idx as f64 / self.fps.max(1e-6));
        let frame = Frame::new(self.stream_id.clone(), self.frame_idx, timestamp, w, h, pixels);
        self.frame_idx += 1;
        Ok(FrameEvent::Frame(frame))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader {
        width: u32,
        height: u32,
    }

    impl DeviceReader for FixedReader {
        fn grab(&mut self) -> Result<(u32, u32, Vec<u8>), SourceError> {
            Ok((self.width, self.height, vec![5u8; 3 * self.width as usize * self.height as usize]))
        }
    }

    #[test]
    fn grabs_frames_with_increasing_index() {
        let mut source = DeviceSource::new(
            StreamId::from("cam0"),
            FixedReader { width: 4, height: 4 },
            1000.0,
            QualityTier::Hd720,
        );
        let FrameEvent::Frame(f0) = source.next().unwrap() else {
            panic!("expected a frame")
        };
        let FrameEvent::Frame(f1) = source.next().unwrap() else {
            panic!("expected a frame")
        };
        assert_eq!(f0.frame_idx, 0);
        assert_eq!(f1.frame_idx, 1);
    }

    #[test]
    fn next_after_close_errors() {
        let mut source = DeviceSource::new(
            StreamId::from("cam0"),
            FixedReader { width: 2, height: 2 },
            30.0,
            QualityTier::Hd720,
        );
        source.close();
        assert!(matches!(source.next(), Err(SourceError::Closed)));
    }
}
