//! Mapping from the library error taxonomies onto wire responses.
//!
//! Every error payload carries the stable taxonomy code, a human-readable
//! message, and, when the instance is known, its current state, so clients
//! can poll `GET /api/transfer/{id}` to a terminal state.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use switchboard::gateway::GatewayError;
use switchboard::providers::SummarizerError;
use switchboard::transfer::{TransferError, TransferState};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Taxonomy code, e.g. `InvalidStateTransition`.
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TransferState>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::NameConflict(_) => StatusCode::CONFLICT,
        GatewayError::RoomNotFound(_) | GatewayError::ParticipantNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        GatewayError::Unavailable(_) | GatewayError::RequestFailed(_) => StatusCode::BAD_GATEWAY,
    }
}

pub fn transfer_error(err: &TransferError, state: Option<TransferState>) -> ApiError {
    let status = match err {
        TransferError::SessionNotFound(_) | TransferError::TransferNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        TransferError::SessionHasActiveTransfer { .. }
        | TransferError::SourceAgentMismatch { .. }
        | TransferError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        TransferError::TargetAgentJoinTimeout(_) | TransferError::CallerJoinTimeout(_) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        TransferError::Gateway(gateway) => gateway_status(gateway),
    };
    let state = state.or(match err {
        TransferError::InvalidStateTransition { state, .. } => Some(*state),
        _ => None,
    });
    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
            state,
        }),
    )
}

pub fn gateway_error(err: &GatewayError) -> ApiError {
    (
        gateway_status(err),
        Json(ErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
            state: None,
        }),
    )
}

pub fn summarizer_error(err: &SummarizerError) -> ApiError {
    let status = match err {
        SummarizerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        SummarizerError::InvalidContext(_) => StatusCode::BAD_REQUEST,
        SummarizerError::Unavailable(_) | SummarizerError::RequestFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
            state: None,
        }),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "InvalidRequest".to_string(),
            message: message.into(),
            state: None,
        }),
    )
}

pub fn conflict(code: &str, message: impl Into<String>) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: code.to_string(),
            message: message.into(),
            state: None,
        }),
    )
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "NotFound".to_string(),
            message: message.into(),
            state: None,
        }),
    )
}
