use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use analytics_types::ApiResponse;

/// Service-boundary error, aggregating every crate-local error via `#[from]`
/// plus a handful of conditions that only make sense at the HTTP edge.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] stream_registry::RegistryError),
    #[error(transparent)]
    Store(#[from] analytics_store::StoreError),
    #[error("invalid base64 frame data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("undecodable frame: {0}")]
    UndecodableFrame(#[from] image::ImageError),
    #[error("failed to open stream source: {0}")]
    SourceOpen(#[from] frame_source_rt::SourceError),
    #[error("stream {0} is already active")]
    StreamAlreadyActive(analytics_types::StreamId),
    #[error("stream {0} is unknown")]
    UnknownStream(analytics_types::StreamId),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::InvalidBase64(_) | ServiceError::UndecodableFrame(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::SourceOpen(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::StreamAlreadyActive(_) => StatusCode::CONFLICT,
            ServiceError::UnknownStream(_) => StatusCode::NOT_FOUND,
            ServiceError::Registry(stream_registry::RegistryError::UnknownStream(_)) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Store(analytics_store::StoreError::UnknownStream(_)) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Registry(stream_registry::RegistryError::IllegalTransition { .. }) => {
                StatusCode::CONFLICT
            }
        };
        let body = Json(ApiResponse::<()>::err(self.to_string()));
        (status, body).into_response()
    }
}
