#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("detector failed: {0}")]
    Detector(String),
    #[error("pose adapter failed: {0}")]
    Pose(String),
    #[error("frame pipeline branch timed out after {0:?}")]
    Timeout(std::time::Duration),
}
