use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_rooms: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub sessions: usize,
    pub active_transfers: usize,
    pub completed_transfers: usize,
    pub failed_transfers: usize,
    pub cancelled_transfers: usize,
    pub stored_summaries: usize,
    pub timestamp: DateTime<Utc>,
}

#[utoipa::path(get, path = "/status",
    responses(
        (status = 200, description = "ok", body = String),
    )
)]
pub(crate) async fn status() -> String {
    "ok".to_string()
}

#[utoipa::path(get, path = "/health",
    responses(
        (status = 200, description = "Room platform reachable", body = HealthResponse),
        (status = 503, description = "Room platform unreachable"),
    )
)]
pub(crate) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.gateway.list_rooms().await {
        Ok(rooms) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                active_rooms: rooms.len(),
                timestamp: Utc::now(),
            }),
        ),
        Err(err) => {
            tracing::error!("health check failed: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    active_rooms: 0,
                    timestamp: Utc::now(),
                }),
            )
        }
    }
}

#[utoipa::path(get, path = "/api/stats",
    responses(
        (status = 200, description = "Coordination statistics", body = StatsResponse),
    )
)]
pub(crate) async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let counts = state.store.counts();
    Json(StatsResponse {
        sessions: state.sessions.len(),
        active_transfers: counts.active,
        completed_transfers: counts.completed,
        failed_transfers: counts.failed,
        cancelled_transfers: counts.cancelled,
        stored_summaries: state.summary_count(),
        timestamp: Utc::now(),
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .with_state(state)
}
