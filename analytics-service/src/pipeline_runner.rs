use std::sync::Arc;

use analytics_types::{AnalyticsRecord, Frame, StreamId};

use crate::state::AppState;

/// Runs one frame through the stream's pipeline plus every step the Frame
/// Pipeline's contract requires of a successful `process`: store, push-
/// channel publish, downstream notify, event derivation. Shared by the
/// synchronous `process_frame` HTTP handler and the file-backed ingest
/// task so both paths behave identically.
pub async fn run_frame(state: &Arc<AppState>, stream_id: &StreamId, frame: Frame) -> AnalyticsRecord {
    let settings = state
        .registry
        .lock()
        .unwrap()
        .settings(stream_id)
        .unwrap_or_default();
    let pipeline = state.pipeline_for(stream_id, &settings);

    let record = {
        let mut pipeline = pipeline.lock().await;
        pipeline.process(&frame).await
    };

    if let Err(err) = state.store.store(stream_id, record.clone()).await {
        tracing::warn!(%stream_id, error = %err, "failed to store analytics record");
        return record;
    }

    state.latest.publish(record.clone());

    let stride = {
        let pipeline = pipeline.lock().await;
        pipeline.latest_stride_and_grf().cloned()
    };
    state.notifier.notify(push_channel::DownstreamSummary::from_record(&record, stride.as_ref()));

    for event in events::derive(&record) {
        tracing::debug!(%stream_id, ?event, "derived event");
    }

    record
}
