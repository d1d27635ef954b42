use analytics_types::StreamId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stream {0} has not been initialized")]
    UnknownStream(StreamId),
}
