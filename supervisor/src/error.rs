#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
