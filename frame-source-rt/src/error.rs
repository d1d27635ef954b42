#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("transient read failure: {0}")]
    Transient(String),
    #[error("source exhausted its reconnect attempts and failed permanently: {0}")]
    Permanent(String),
    #[error("source is already closed")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
