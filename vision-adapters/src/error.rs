#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("detector adapter failed: {0}")]
    Detector(String),
    #[error("pose adapter failed: {0}")]
    Pose(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
