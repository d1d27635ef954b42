use std::fs::File;
use std::io::{BufReader, Read};

use analytics_types::{Frame, StreamId, Timestamp};

use crate::error::SourceError;
use crate::quality::downscale_to_tier;
use crate::source::{FrameEvent, FrameSource};
use analytics_types::QualityTier;

/// Container header for the raw frame file read by [`FileSource`]: a
/// `width:u32, height:u32, fps:f64` preamble followed by `width*height*3`
/// bytes per frame, packed RGB8, back to back. This is not a real codec —
/// it exists so the offline CLI and tests have a deterministic, dependency
/// free frame source to drive.
const HEADER_LEN: usize = 4 + 4 + 8;

/// Deterministic, file-backed frame source. No reconnect logic applies —
/// reaching the end of the file is a normal `EndOfStream`, not a failure.
pub struct FileSource {
    stream_id: StreamId,
    reader: BufReader<File>,
    width: u32,
    height: u32,
    fps: f64,
    quality_tier: QualityTier,
    frame_idx: u64,
    closed: bool,
}

impl FileSource {
    pub fn open(stream_id: StreamId, path: &str, quality_tier: QualityTier) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        let width = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let height = u32::from_le_bytes(header[4..8].try_into().unwrap());
        let fps = f64::from_le_bytes(header[8..16].try_into().unwrap());

        Ok(FileSource {
            stream_id,
            reader,
            width,
            height,
            fps,
            quality_tier,
            frame_idx: 0,
            closed: false,
        })
    }
}

impl FrameSource for FileSource {
    fn next(&mut self) -> Result<FrameEvent, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }

        let frame_len = self.width as usize * self.height as usize * 3;
        let mut buf = vec![0u8; frame_len];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(FrameEvent::EndOfStream);
            }
            Err(e) => return Err(SourceError::Io(e)),
        }

        let (w, h, pixels) = downscale_to_tier(self.width, self.height, &buf, self.quality_tier);
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
    use std::io::Write;

    fn write_test_file(path: &str, width: u32, height: u32, fps: f64, frame_count: usize) {
        let mut file = File::create(path).unwrap();
        file.write_all(&width.to_le_bytes()).unwrap();
        file.write_all(&height.to_le_bytes()).unwrap();
        file.write_all(&fps.to_le_bytes()).unwrap();
        for i in 0..frame_count {
            let value = (i % 256) as u8;
            file.write_all(&vec![value; width as usize * height as usize * 3])
                .unwrap();
        }
    }

    #[test]
    fn reads_frames_then_reports_end_of_stream() {
        let path = std::env::temp_dir().join("frame_source_rt_test_a.bin");
        let path = path.to_str().unwrap();
        write_test_file(path, 4, 4, 30.0, 2);

        let mut source =
            FileSource::open(StreamId::from("s1"), path, QualityTier::Hd1080).unwrap();
        match source.next().unwrap() {
            FrameEvent::Frame(frame) => {
                assert_eq!(frame.frame_idx, 0);
                assert_eq!((frame.width, frame.height), (4, 4));
            }
            other => panic!("expected a frame, got {other:?}"),
        }
        match source.next().unwrap() {
            FrameEvent::Frame(frame) => assert_eq!(frame.frame_idx, 1),
            other => panic!("expected a frame, got {other:?}"),
        }
        assert!(matches!(source.next().unwrap(), FrameEvent::EndOfStream));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn next_after_close_errors() {
        let path = std::env::temp_dir().join("frame_source_rt_test_b.bin");
        let path = path.to_str().unwrap();
        write_test_file(path, 2, 2, 30.0, 1);

        let mut source =
            FileSource::open(StreamId::from("s1"), path, QualityTier::Hd1080).unwrap();
        source.close();
        assert!(matches!(source.next(), Err(SourceError::Closed)));
        std::fs::remove_file(path).ok();
    }
}
