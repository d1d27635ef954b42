use analytics_types::{Frame, QualityTier, StreamId, Timestamp};

use crate::error::SourceError;
use crate::quality::downscale_to_tier;
use crate::rate_limit::RateLimiter;
use crate::reconnect::ReconnectPolicy;
use crate::source::{FrameEvent, FrameSource};

/// Wire protocol a [`NetworkFrameSource`] was opened against. Carried only
/// for logging and metrics labelling — the byte-level framing is handled
/// uniformly by `ByteReader`, since none of RTMP/HTTP-MJPEG/UDP demuxing is
/// in scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Protocol {
    Rtmp,
    Http,
    Udp,
}

/// Supplies one packed-RGB8 frame per call, or `None` on a transient gap in
/// the underlying connection (dropped packet, stalled socket). A real
/// implementation decodes RTMP/MJPEG/UDP payloads here; this crate treats
/// that decoding as out of scope and takes a reader that already produces
/// raw frames.
pub trait ByteReader: Send {
    fn read_frame(&mut self) -> Result<Option<(u32, u32, Vec<u8>)>, SourceError>;
}

/// Network-backed frame source shared by the RTMP, HTTP and UDP source
/// kinds: reconnect-on-failure plus target-rate admission plus quality-tier
/// downscale wrapped around a protocol-specific [`ByteReader`].
pub struct NetworkFrameSource<R: ByteReader> {
    stream_id: StreamId,
    protocol: Protocol,
    reader: R,
    reconnect: ReconnectPolicy,
    rate_limiter: RateLimiter,
    quality_tier: QualityTier,
    fps: f64,
    frame_idx: u64,
    closed: bool,
}

impl<R: ByteReader> NetworkFrameSource<R> {
    pub fn new(
        stream_id: StreamId,
        protocol: Protocol,
        reader: R,
        reconnect: ReconnectPolicy,
        target_fps: f64,
        quality_tier: QualityTier,
    ) -> Self {
        NetworkFrameSource {
            stream_id,
            protocol,
            reader,
            reconnect,
            rate_limiter: RateLimiter::new(target_fps),
            quality_tier,
            fps: target_fps,
            frame_idx: 0,
            closed: false,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

impl<R: ByteReader> FrameSource for NetworkFrameSource<R> {
    fn next(&mut self) -> Result<FrameEvent, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }

        match self.reader.read_frame() {
            Ok(Some((width, height, pixels))) => {
                self.reconnect.reset();
                if !self.rate_limiter.admit(std::time::Instant::now()) {
                    return self.next();
                }
                let (w, h, pixels) = downscale_to_tier(width, height, &pixels, self.quality_tier);
                let timestamp =
                    Timestamp::from_secs_f64(self.frame_idx as f64 / self.fps.max(1e-6));
                let frame =
                    Frame::new(self.stream_id.clone(), self.frame_idx, timestamp, w, h, pixels);
                self.frame_idx += 1;
                Ok(FrameEvent::Frame(frame))
            }
            Ok(None) => Ok(FrameEvent::EndOfStream),
            Err(SourceError::Transient(msg)) => match self.reconnect.next_delay() {
                Some(delay) => {
                    tracing::warn!(stream_id = %self.stream_id, ?delay, "transient read failure, will retry");
                    Ok(FrameEvent::Transient(msg))
                }
                None => {
                    tracing::error!(stream_id = %self.stream_id, "reconnect attempts exhausted");
                    Err(SourceError::Permanent(format!(
                        "{:?} source {} exhausted reconnect attempts: {msg}",
                        self.protocol, self.stream_id
                    )))
                }
            },
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct ScriptedReader {
        events: Vec<Result<Option<(u32, u32, Vec<u8>)>, SourceError>>,
    }

    impl ByteReader for ScriptedReader {
        fn read_frame(&mut self) -> Result<Option<(u32, u32, Vec<u8>)>, SourceError> {
            if self.events.is_empty() {
                return Ok(None);
            }
            self.events.remove(0)
        }
    }

    fn reconnect() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(1), Duration::from_millis(10), 3)
    }

    #[test]
    fn yields_frames_then_end_of_stream() {
        let reader = ScriptedReader {
            events: vec![Ok(Some((2, 2, vec![10u8; 12]))), Ok(None)],
        };
        let mut source = NetworkFrameSource::new(
            StreamId::from("net1"),
            Protocol::Http,
            reader,
            reconnect(),
            1000.0,
            QualityTier::Hd1080,
        );
        assert!(matches!(source.next().unwrap(), FrameEvent::Frame(_)));
        assert!(matches!(source.next().unwrap(), FrameEvent::EndOfStream));
    }

    #[test]
    fn transient_error_reports_until_reconnect_budget_is_exhausted() {
        let reader = ScriptedReader {
            events: vec![
                Err(SourceError::Transient("blip".into())),
                Err(SourceError::Transient("blip".into())),
                Err(SourceError::Transient("blip".into())),
                Err(SourceError::Transient("blip".into())),
            ],
        };
        let mut source = NetworkFrameSource::new(
            StreamId::from("net1"),
            Protocol::Udp,
            reader,
            reconnect(),
            1000.0,
            QualityTier::Hd1080,
        );
        assert!(matches!(source.next().unwrap(), FrameEvent::Transient(_)));
        assert!(matches!(source.next().unwrap(), FrameEvent::Transient(_)));
        assert!(matches!(source.next().unwrap(), FrameEvent::Transient(_)));
        assert!(matches!(source.next(), Err(SourceError::Permanent(_))));
    }

    #[test]
    fn next_after_close_errors() {
        let reader = ScriptedReader { events: vec![] };
        let mut source = NetworkFrameSource::new(
            StreamId::from("net1"),
            Protocol::Rtmp,
            reader,
            reconnect(),
            30.0,
            QualityTier::Hd1080,
        );
        source.close();
        assert!(matches!(source.next(), Err(SourceError::Closed)));
    }
}
