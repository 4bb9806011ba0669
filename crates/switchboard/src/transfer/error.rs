use std::time::Duration;

use thiserror::Error;

use super::types::TransferState;
use crate::gateway::GatewayError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("call session not found: {0}")]
    SessionNotFound(String),

    #[error("session {session_id} already has an active transfer ({transfer_id})")]
    SessionHasActiveTransfer {
        session_id: String,
        transfer_id: String,
    },

    #[error("transfer not found: {0}")]
    TransferNotFound(String),

    #[error("agent {agent_id} is not the connected agent for session {session_id}")]
    SourceAgentMismatch {
        session_id: String,
        agent_id: String,
    },

    #[error("invalid state transition for transfer {transfer_id}: state is {state}")]
    InvalidStateTransition {
        transfer_id: String,
        state: TransferState,
    },

    #[error("target agent did not join the destination room within {0:?}")]
    TargetAgentJoinTimeout(Duration),

    #[error("caller did not join the destination room within {0:?}")]
    CallerJoinTimeout(Duration),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl TransferError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::SessionNotFound(_) => "SessionNotFound",
            TransferError::SessionHasActiveTransfer { .. } => "SessionHasActiveTransfer",
            TransferError::TransferNotFound(_) => "TransferNotFound",
            TransferError::SourceAgentMismatch { .. } => "SourceAgentMismatch",
            TransferError::InvalidStateTransition { .. } => "InvalidStateTransition",
            TransferError::TargetAgentJoinTimeout(_) => "TargetAgentJoinTimeout",
            TransferError::CallerJoinTimeout(_) => "CallerJoinTimeout",
            TransferError::Gateway(err) => err.code(),
        }
    }
}
