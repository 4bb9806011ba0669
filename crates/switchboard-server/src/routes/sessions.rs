use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use switchboard::session::CallSession;
use utoipa::ToSchema;
use uuid::Uuid;

use super::errors::{self, ApiError, ErrorResponse};
use crate::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSessionRequest {
    /// Generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    pub room_name: String,
    pub agent_id: String,
}

#[utoipa::path(post, path = "/api/sessions",
    request_body = RegisterSessionRequest,
    responses(
        (status = 201, description = "Caller registered", body = CallSession),
        (status = 409, description = "Session id already in use", body = ErrorResponse),
    )
)]
pub(crate) async fn register_session(
    State(state): State<AppState>,
    Json(request): Json<RegisterSessionRequest>,
) -> Result<(StatusCode, Json<CallSession>), ApiError> {
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    match state
        .sessions
        .register(&session_id, &request.room_name, &request.agent_id)
    {
        Some(session) => {
            tracing::info!(%session_id, room = %request.room_name, "call session registered");
            Ok((StatusCode::CREATED, Json(session)))
        }
        None => Err(errors::conflict(
            "SessionExists",
            format!("session {session_id} already exists"),
        )),
    }
}

#[utoipa::path(delete, path = "/api/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Call session id")),
    responses(
        (status = 204, description = "Caller disconnected"),
        (status = 404, description = "No such session", body = ErrorResponse),
    )
)]
pub(crate) async fn remove_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // A disconnecting caller implicitly abandons any in-flight transfer.
    if let Some(transfer_id) = state.store.active_transfer_id(&session_id) {
        if let Err(err) = state.orchestrator.cancel(&transfer_id).await {
            tracing::warn!(%session_id, %transfer_id, "cancel on disconnect failed: {err}");
        }
    }
    match state.sessions.remove(&session_id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(errors::not_found(format!("session {session_id} not found"))),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(register_session))
        .route("/api/sessions/{session_id}", delete(remove_session))
        .with_state(state)
}
