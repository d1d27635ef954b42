use analytics_types::{StreamId, StreamState};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("stream {0} is not registered")]
    UnknownStream(StreamId),
    #[error("illegal transition for stream {stream_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        stream_id: StreamId,
        from: StreamState,
        to: StreamState,
    },
}
