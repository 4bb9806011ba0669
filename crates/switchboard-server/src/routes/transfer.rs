use axum::extract::{Path, State};
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use switchboard::gateway::RoomCredential;
use switchboard::transfer::{TransferError, TransferInstance, TransferState};
use utoipa::ToSchema;

use super::errors::{self, ApiError, ErrorResponse};
use crate::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateTransferRequest {
    pub session_id: String,
    /// Defaults to the agent currently connected to the session.
    #[serde(default)]
    pub source_agent_id: Option<String>,
    pub target_agent_id: String,
    /// Conversation so far, fed to the summarizer.
    #[serde(default)]
    pub context_blob: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransferRequest {
    pub transfer_id: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelTransferRequest {
    pub transfer_id: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransferResponse {
    pub transfer_id: String,
    pub state: TransferState,
    pub warnings: Vec<String>,
    /// Credential bridging the caller into the destination room.
    pub caller_credential: RoomCredential,
}

#[utoipa::path(post, path = "/api/initiate-transfer",
    request_body = InitiateTransferRequest,
    responses(
        (status = 200, description = "Transfer started", body = TransferInstance),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "Session already transferring, or wrong source agent", body = ErrorResponse),
        (status = 502, description = "Room platform failure", body = ErrorResponse),
    )
)]
pub(crate) async fn initiate_transfer(
    State(state): State<AppState>,
    Json(request): Json<InitiateTransferRequest>,
) -> Result<Json<TransferInstance>, ApiError> {
    let source_agent_id = match request.source_agent_id {
        Some(agent_id) => agent_id,
        None => state
            .sessions
            .get(&request.session_id)
            .map(|session| session.current_agent_id)
            .ok_or_else(|| {
                errors::transfer_error(
                    &TransferError::SessionNotFound(request.session_id.clone()),
                    None,
                )
            })?,
    };

    state
        .orchestrator
        .initiate(
            &request.session_id,
            &source_agent_id,
            &request.target_agent_id,
            request.context_blob,
        )
        .await
        .map(Json)
        .map_err(|err| errors::transfer_error(&err, None))
}

#[utoipa::path(get, path = "/api/transfer/{transfer_id}",
    params(("transfer_id" = String, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Current transfer state", body = TransferInstance),
        (status = 404, description = "No such transfer", body = ErrorResponse),
    )
)]
pub(crate) async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> Result<Json<TransferInstance>, ApiError> {
    state
        .store
        .get(&transfer_id)
        .map(Json)
        .ok_or_else(|| errors::not_found(format!("transfer {transfer_id} not found")))
}

#[utoipa::path(post, path = "/api/complete-transfer",
    request_body = CompleteTransferRequest,
    responses(
        (status = 200, description = "Caller bridged, transfer committed", body = CompleteTransferResponse),
        (status = 409, description = "Not in AGENT_JOINED", body = ErrorResponse),
        (status = 504, description = "Caller never arrived", body = ErrorResponse),
    )
)]
pub(crate) async fn complete_transfer(
    State(state): State<AppState>,
    Json(request): Json<CompleteTransferRequest>,
) -> Result<Json<CompleteTransferResponse>, ApiError> {
    match state.orchestrator.complete(&request.transfer_id).await {
        Ok((instance, credential)) => Ok(Json(CompleteTransferResponse {
            transfer_id: instance.transfer_id,
            state: instance.state,
            warnings: instance.warnings,
            caller_credential: credential,
        })),
        Err(err) => {
            let current = state.store.get(&request.transfer_id).map(|i| i.state);
            Err(errors::transfer_error(&err, current))
        }
    }
}

#[utoipa::path(post, path = "/api/cancel-transfer",
    request_body = CancelTransferRequest,
    responses(
        (status = 200, description = "Transfer cancelled", body = TransferInstance),
        (status = 404, description = "No such transfer", body = ErrorResponse),
        (status = 409, description = "Already terminal", body = ErrorResponse),
    )
)]
pub(crate) async fn cancel_transfer(
    State(state): State<AppState>,
    Json(request): Json<CancelTransferRequest>,
) -> Result<Json<TransferInstance>, ApiError> {
    match state.orchestrator.cancel(&request.transfer_id).await {
        Ok(instance) => Ok(Json(instance)),
        Err(err) => {
            let current = state.store.get(&request.transfer_id).map(|i| i.state);
            Err(errors::transfer_error(&err, current))
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/initiate-transfer", post(initiate_transfer))
        .route("/api/transfer/{transfer_id}", get(get_transfer))
        .route("/api/complete-transfer", post(complete_transfer))
        .route("/api/cancel-transfer", post(cancel_transfer))
        .with_state(state)
}
