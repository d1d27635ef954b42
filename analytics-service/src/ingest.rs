use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use analytics_types::{QualityTier, SourceConfig, SourceKind, StreamId};
use frame_source_rt::{FileSource, FrameEvent, FrameSource, SourceError};

use crate::pipeline_runner::run_frame;
use crate::state::AppState;

/// Opens the concrete frame source `start_stream` should synchronously
/// fail on (spec's "500 on source open failure"), or `None` for a source
/// kind with no real backend in this exercise.
///
/// Only `file` sources have one — `DeviceSource`/`NetworkFrameSource` are
/// generic over `DeviceReader`/`ByteReader` traits with no concrete
/// webcam/RTMP/HTTP/UDP implementation, mirroring the Detector/Pose
/// adapters' "the model is out of scope" posture. Streams opened with any
/// other `source_type` are registered and marked active exactly as a file
/// stream is, relying on an external caller to push frames through
/// `process_frame` instead.
pub fn open_if_file_backed(
    source: &SourceConfig,
    stream_id: &StreamId,
    quality_tier: QualityTier,
) -> Result<Option<FileSource>, SourceError> {
    if source.source_type != SourceKind::File {
        return Ok(None);
    }
    FileSource::open(stream_id.clone(), &source.source_url, quality_tier).map(Some)
}

/// Spawns the background task pumping `frame_source` into the same
/// per-stream pipeline `/analytics/process_frame` drives, at `target_fps`.
pub fn spawn(
    state: Arc<AppState>,
    stream_id: StreamId,
    mut frame_source: FileSource,
    target_fps: f64,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let period = Duration::from_secs_f64(1.0 / target_fps.max(1e-6));
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    frame_source.close();
                    return;
                }
                _ = ticker.tick() => {}
            }

            match frame_source.next() {
                Ok(FrameEvent::Frame(frame)) => {
                    run_frame(&state, &stream_id, frame).await;
                }
                Ok(FrameEvent::EndOfStream) => {
                    frame_source.close();
                    return;
                }
                Ok(FrameEvent::Transient(msg)) => {
                    tracing::warn!(%stream_id, msg, "transient frame source read failure");
                }
                Err(err) => {
                    tracing::error!(%stream_id, error = %err, "frame source failed permanently");
                    state.registry.lock().unwrap().mark_error(&stream_id).ok();
                    return;
                }
            }
        }
    });
}
