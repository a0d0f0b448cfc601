//! HTTP text source
//!
//! The browser-side observer posts what it sees; the relay pulls it from
//! `DocumentState` after each notification.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use speech_relay_core::{RegionId, TextSource};
use speech_relay_pipeline::StreamSnapshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/observe", post(observe))
        .route("/visibility", post(visibility))
        .route("/status", get(status))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Snapshot of the latest answer region
#[derive(Debug, Deserialize)]
struct ObserveRequest {
    region: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct VisibilityRequest {
    visible: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    policy: String,
    visible: bool,
    stream: Option<StreamSnapshot>,
}

async fn observe(
    State(state): State<AppState>,
    Json(request): Json<ObserveRequest>,
) -> Result<StatusCode, StatusCode> {
    let region = request.region.trim();
    if region.is_empty() {
        return Err(ServerError::InvalidRequest("region must not be empty".into()).into());
    }

    debug!(region, bytes = request.text.len(), "Observation received");
    state.document.update(RegionId::new(region), request.text);
    notify(&state)?;

    Ok(StatusCode::ACCEPTED)
}

async fn visibility(
    State(state): State<AppState>,
    Json(request): Json<VisibilityRequest>,
) -> Result<StatusCode, StatusCode> {
    if state.document.set_visible(request.visible) {
        debug!(visible = request.visible, "Visibility reported");
    }
    notify(&state)?;

    Ok(StatusCode::ACCEPTED)
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        policy: state.policy.to_string(),
        visible: state.document.is_visible(),
        stream: state.status.read().clone(),
    })
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn notify(state: &AppState) -> Result<(), StatusCode> {
    if state.notifier.notify() {
        Ok(())
    } else {
        Err(ServerError::SessionStopped.into())
    }
}
