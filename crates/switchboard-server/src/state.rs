use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use switchboard::gateway::RoomGateway;
use switchboard::providers::{SummaryStyle, Summarizer};
use switchboard::session::SessionRegistry;
use switchboard::transfer::{Orchestrator, OrchestratorPolicy, TransferStore};
use utoipa::ToSchema;
use uuid::Uuid;

/// A stored standalone summary, retrievable by id.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredSummary {
    pub summary_id: String,
    pub summary: String,
    pub style: SummaryStyle,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<TransferStore>,
    pub gateway: Arc<dyn RoomGateway>,
    pub summarizer: Arc<dyn Summarizer>,
    pub policy: OrchestratorPolicy,
    summaries: Arc<Mutex<HashMap<String, StoredSummary>>>,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn RoomGateway>,
        summarizer: Arc<dyn Summarizer>,
        policy: OrchestratorPolicy,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        let store = Arc::new(TransferStore::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&sessions),
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::clone(&summarizer),
            policy.clone(),
        );
        Self {
            orchestrator,
            sessions,
            store,
            gateway,
            summarizer,
            policy,
            summaries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store_summary(&self, summary: String, style: SummaryStyle) -> StoredSummary {
        let stored = StoredSummary {
            summary_id: Uuid::new_v4().to_string(),
            summary,
            style,
            generated_at: Utc::now(),
        };
        let _ = self
            .summaries
            .lock()
            .unwrap()
            .insert(stored.summary_id.clone(), stored.clone());
        stored
    }

    pub fn get_summary(&self, summary_id: &str) -> Option<StoredSummary> {
        self.summaries.lock().unwrap().get(summary_id).cloned()
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.lock().unwrap().len()
    }
}
