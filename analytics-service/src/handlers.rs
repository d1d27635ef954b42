use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;

use analytics_types::{
    ActiveStreamEntry, AnalyticsRecord, ApiResponse, Frame, HealthResponse, ProcessFrameRequest,
    SettingsPatchRequest, StartStreamRequest, StreamId, StreamMetricsResponse, StreamState,
};

use crate::error::ServiceError;
use crate::ingest;
use crate::pipeline_runner::run_frame;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ready: true,
        active_stream_count: state.active_pipeline_count(),
    })
}

pub async fn process_frame(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessFrameRequest>,
) -> Result<Json<ApiResponse<AnalyticsRecord>>, ServiceError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(request.frame_data)?;
    let decoded = image::load_from_memory(&bytes)?.to_rgb8();
    let (width, height) = decoded.dimensions();
    let frame = Frame::new(
        request.stream_id.clone(),
        request.frame_idx,
        request.timestamp,
        width,
        height,
        decoded.into_raw(),
    );

    if state.registry.lock().unwrap().state(&request.stream_id).is_none() {
        return Err(ServiceError::UnknownStream(request.stream_id));
    }

    let record = run_frame(&state, &request.stream_id, frame).await;
    Ok(Json(ApiResponse::ok(record)))
}

pub async fn start_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartStreamRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let settings = request.settings.clone().unwrap_or_default();
    {
        let registry = state.registry.lock().unwrap();
        if registry.state(&request.stream_id) == Some(StreamState::Active) {
            return Err(ServiceError::StreamAlreadyActive(request.stream_id));
        }
    }

    // File sources are opened synchronously so a bad path fails the request
    // with a 500 up front, instead of only surfacing inside a background
    // task nobody is watching.
    let opened = ingest::open_if_file_backed(&request.source, &request.stream_id, settings.quality_tier)?;

    state
        .registry
        .lock()
        .unwrap()
        .start(request.stream_id.clone(), request.source.clone(), settings.clone())?;
    state
        .store
        .initialize(request.stream_id.clone(), settings.clone(), current_timestamp())
        .await;
    state.registry.lock().unwrap().mark_active(&request.stream_id)?;

    if let Some(frame_source) = opened {
        let cancel = tokio_util::sync::CancellationToken::new();
        ingest::spawn(
            state.clone(),
            request.stream_id.clone(),
            frame_source,
            settings.target_fps,
            cancel.clone(),
        );
        state.register_ingest(request.stream_id, cancel);
    }

    Ok(Json(ApiResponse::ok(())))
}

pub async fn stop_stream(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<StreamId>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let state_now = state.registry.lock().unwrap().state(&stream_id);
    if state_now.is_none() || state_now == Some(StreamState::Inactive) {
        return Ok(Json(ApiResponse::ok(())));
    }

    if state_now == Some(StreamState::Active) {
        state.registry.lock().unwrap().stop(&stream_id)?;
    }
    state.stop_ingest(&stream_id);
    state.registry.lock().unwrap().mark_released(&stream_id)?;
    state.remove_pipeline(&stream_id);
    state.store.cleanup(&stream_id, current_timestamp()).await.ok();

    Ok(Json(ApiResponse::ok(())))
}

pub async fn latest(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<StreamId>,
) -> Result<Json<ApiResponse<AnalyticsRecord>>, ServiceError> {
    match state.store.latest(&stream_id).await {
        Some(record) => Ok(Json(ApiResponse::ok(record))),
        None => Err(ServiceError::UnknownStream(stream_id)),
    }
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<StreamId>,
) -> Result<Json<ApiResponse<analytics_types::Summary>>, ServiceError> {
    let summary = state.store.summary(&stream_id).await?;
    Ok(Json(ApiResponse::ok(summary)))
}

pub async fn metrics(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<StreamId>,
) -> Result<Json<ApiResponse<StreamMetricsResponse>>, ServiceError> {
    let summary = state.store.summary(&stream_id).await?;
    Ok(Json(ApiResponse::ok(StreamMetricsResponse::from(&summary))))
}

pub async fn patch_settings(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<StreamId>,
    Json(patch): Json<SettingsPatchRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    // Applied at the next frame boundary: the registry's settings are
    // updated immediately, but the running pipeline for this stream is
    // only rebuilt the next time `process_frame` looks one up, since the
    // pipeline holds its own copy of tracker/kinematics config.
    state.registry.lock().unwrap().update_settings(&stream_id, &patch)?;
    state.remove_pipeline(&stream_id);
    Ok(Json(ApiResponse::ok(())))
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<StreamId>,
    ws: WebSocketUpgrade,
) -> Response {
    let receiver = state.latest.subscribe(&stream_id);
    ws.on_upgrade(move |socket| {
        push_channel::run_connection(socket, receiver, push_channel::cadence_from_hz(push_channel::DEFAULT_CADENCE_HZ))
    })
    .into_response()
}

pub async fn streams_active(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<ActiveStreamEntry>>> {
    let registry = state.registry.lock().unwrap();
    let entries = registry
        .all_streams()
        .map(|(id, entry)| ActiveStreamEntry {
            stream_id: id.clone(),
            state: entry.state,
            settings: entry.settings.clone(),
            // This service has no viewer-tracking capability of its own;
            // the front-end that owns viewership is expected to patch
            // this in via the core service. See DESIGN.md.
            viewer_count: 0,
        })
        .collect();
    Json(ApiResponse::ok(entries))
}

fn current_timestamp() -> analytics_types::Timestamp {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    analytics_types::Timestamp::from_secs_f64(secs)
}
