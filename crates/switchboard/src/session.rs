//! Call sessions: the caller's persistent identity across any number of
//! transfers.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One caller's ongoing conversation. Exactly one agent is connected at any
/// instant; `current_agent_id` moves only at the transfer commit point.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub session_id: String,
    pub origin_room_id: String,
    pub current_agent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory registry of live call sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, CallSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected caller. Returns `None` when the id is
    /// already taken.
    pub fn register(
        &self,
        session_id: impl Into<String>,
        origin_room_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Option<CallSession> {
        let session_id = session_id.into();
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session_id) {
            return None;
        }
        let now = Utc::now();
        let session = CallSession {
            session_id: session_id.clone(),
            origin_room_id: origin_room_id.into(),
            current_agent_id: agent_id.into(),
            created_at: now,
            updated_at: now,
        };
        let _ = sessions.insert(session_id, session.clone());
        Some(session)
    }

    pub fn get(&self, session_id: &str) -> Option<CallSession> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    /// Caller disconnected entirely.
    pub fn remove(&self, session_id: &str) -> Option<CallSession> {
        self.sessions.lock().unwrap().remove(session_id)
    }

    /// The transfer commit point: atomically repoint the session at the new
    /// agent and room. Returns `false` when the session no longer exists.
    pub fn commit_transfer(&self, session_id: &str, agent_id: &str, room_id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.current_agent_id = agent_id.to_string();
                session.origin_room_id = room_id.to_string();
                session.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_duplicate_ids() {
        let registry = SessionRegistry::new();
        assert!(registry.register("s1", "room-1", "agent-a").is_some());
        assert!(registry.register("s1", "room-2", "agent-b").is_none());
        assert_eq!(registry.get("s1").unwrap().origin_room_id, "room-1");
    }

    #[test]
    fn commit_repoints_agent_and_room() {
        let registry = SessionRegistry::new();
        let _ = registry.register("s1", "room-1", "agent-a");
        assert!(registry.commit_transfer("s1", "agent-b", "room-2"));

        let session = registry.get("s1").unwrap();
        assert_eq!(session.current_agent_id, "agent-b");
        assert_eq!(session.origin_room_id, "room-2");
    }

    #[test]
    fn commit_on_missing_session_reports_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.commit_transfer("nope", "agent-b", "room-2"));
    }
}
