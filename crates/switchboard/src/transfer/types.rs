use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Initiated,
    RoomReady,
    SummaryReady,
    AgentJoined,
    Completed,
    Failed,
    Cancelled,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Cancelled
        )
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransferState::Initiated => "INITIATED",
            TransferState::RoomReady => "ROOM_READY",
            TransferState::SummaryReady => "SUMMARY_READY",
            TransferState::AgentJoined => "AGENT_JOINED",
            TransferState::Completed => "COMPLETED",
            TransferState::Failed => "FAILED",
            TransferState::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// One in-flight or completed warm transfer attempt for a call session.
///
/// Mutated exclusively through the transfer store; immutable once terminal
/// (warnings excepted; post-commit cleanup failures attach there).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferInstance {
    pub transfer_id: String,
    pub session_id: String,
    pub source_agent_id: String,
    pub target_agent_id: String,
    /// Conversation context captured at initiate time; kept so summary
    /// generation can be re-triggered.
    #[serde(skip)]
    pub context_blob: String,
    pub destination_room_id: Option<String>,
    pub summary: Option<String>,
    /// Set when the bounded summarization attempts were exhausted and the
    /// transfer proceeded without a summary.
    pub summary_degraded: bool,
    pub state: TransferState,
    pub failure_reason: Option<String>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferInstance {
    pub fn new(
        session_id: impl Into<String>,
        source_agent_id: impl Into<String>,
        target_agent_id: impl Into<String>,
        context_blob: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            transfer_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            source_agent_id: source_agent_id.into(),
            target_agent_id: target_agent_id.into(),
            context_blob: context_blob.into(),
            destination_room_id: None,
            summary: None,
            summary_degraded: false,
            state: TransferState::Initiated,
            failure_reason: None,
            warnings: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn fail(&mut self, reason: &str) {
        self.state = TransferState::Failed;
        self.failure_reason = Some(reason.to_string());
    }
}
