use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("room platform unavailable: {0}")]
    Unavailable(String),

    #[error("room name already in use: {0}")]
    NameConflict(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("participant {identity} not found in room {room}")]
    ParticipantNotFound { room: String, identity: String },

    #[error("gateway request failed: {0}")]
    RequestFailed(String),
}

impl GatewayError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Unavailable(_) => "GatewayUnavailable",
            GatewayError::NameConflict(_) => "NameConflict",
            GatewayError::RoomNotFound(_) => "RoomNotFound",
            GatewayError::ParticipantNotFound { .. } => "ParticipantNotFound",
            GatewayError::RequestFailed(_) => "GatewayRequestFailed",
        }
    }
}

fn is_network_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || (err.status().is_none() && err.is_request())
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if is_network_error(&err) {
            return GatewayError::Unavailable(err.to_string());
        }
        GatewayError::RequestFailed(err.to_string())
    }
}
