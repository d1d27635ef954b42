use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/analytics/process_frame", post(handlers::process_frame))
        .route("/analytics/start_stream", post(handlers::start_stream))
        .route("/analytics/stop_stream/{stream_id}", post(handlers::stop_stream))
        .route("/analytics/{stream_id}/latest", get(handlers::latest))
        .route("/analytics/{stream_id}/summary", get(handlers::summary))
        .route("/analytics/{stream_id}/metrics", get(handlers::metrics))
        .route("/analytics/{stream_id}/settings", patch(handlers::patch_settings))
        .route("/ws/{stream_id}", get(handlers::ws_handler))
        .route("/streams/active", get(handlers::streams_active))
        .with_state(state)
}
