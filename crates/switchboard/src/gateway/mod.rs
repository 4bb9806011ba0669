//! Client for the external room platform.
//!
//! The platform owns rooms and their participants; this side only requests
//! changes and observes membership. Credential minting stays on the platform:
//! the orchestrator never moves media itself, a participant joins by
//! presenting the credential issued here.

pub mod errors;
pub mod fixture;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use errors::GatewayError;
pub use fixture::FixtureGateway;
pub use http::HttpRoomGateway;

/// A room as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomHandle {
    /// Room name; rooms are addressed by name throughout.
    pub name: String,
    /// Platform-assigned identifier.
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub num_participants: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub identity: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Short-lived join credential issued by the platform. Opaque to this side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomCredential {
    pub token: String,
    pub room: String,
    pub identity: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Role a credential is issued for; the platform maps roles to grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Caller,
    Agent,
    Observer,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Caller => "caller",
            ParticipantRole::Agent => "agent",
            ParticipantRole::Observer => "observer",
        }
    }
}

impl std::str::FromStr for ParticipantRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "caller" => Ok(ParticipantRole::Caller),
            "agent" => Ok(ParticipantRole::Agent),
            "observer" => Ok(ParticipantRole::Observer),
            other => Err(format!("unknown participant role: {other}")),
        }
    }
}

/// Capability set of the room platform. No retries here; retry policy lives
/// in the orchestrator.
#[async_trait]
pub trait RoomGateway: Send + Sync {
    async fn create_room(
        &self,
        name: &str,
        max_participants: u32,
    ) -> Result<RoomHandle, GatewayError>;

    async fn list_rooms(&self) -> Result<Vec<RoomHandle>, GatewayError>;

    /// Tears the room down, disconnecting every participant.
    async fn delete_room(&self, room: &str) -> Result<(), GatewayError>;

    async fn issue_credential(
        &self,
        room: &str,
        identity: &str,
        role: ParticipantRole,
    ) -> Result<RoomCredential, GatewayError>;

    async fn list_participants(&self, room: &str) -> Result<Vec<ParticipantInfo>, GatewayError>;

    async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), GatewayError>;

    /// Poll room membership until `identity` is present or `wait` elapses.
    ///
    /// This is the single place join detection lives. Transient listing
    /// failures do not abort the wait; a missing room means the participant
    /// can no longer join, so the wait ends early.
    async fn await_participant(
        &self,
        room: &str,
        identity: &str,
        wait: Duration,
    ) -> Result<bool, GatewayError> {
        let deadline = tokio::time::Instant::now() + wait;
        let mut interval = Duration::from_millis(500);
        loop {
            match self.list_participants(room).await {
                Ok(participants) => {
                    if participants.iter().any(|p| p.identity == identity) {
                        return Ok(true);
                    }
                }
                Err(GatewayError::RoomNotFound(_)) => return Ok(false),
                Err(err) => {
                    tracing::warn!(room, identity, "participant poll failed: {err}");
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let remaining = deadline - now;
            tokio::time::sleep(interval.min(remaining)).await;
            interval = (interval * 2).min(Duration::from_secs(5));
        }
    }
}
