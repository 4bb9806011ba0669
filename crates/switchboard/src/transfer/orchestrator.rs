//! The transfer orchestrator.
//!
//! Drives `INITIATED → ROOM_READY → SUMMARY_READY → AGENT_JOINED →
//! COMPLETED`, with `FAILED` and `CANCELLED` reachable from any non-terminal
//! state. External calls (room creation, credential issuance, summarization,
//! join polling) happen outside the per-instance lock; their results are
//! applied optimistically and discarded when the instance moved on in the
//! meantime.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::TransferError;
use super::store::TransferStore;
use super::types::{TransferInstance, TransferState};
use crate::config::Config;
use crate::gateway::{GatewayError, ParticipantRole, RoomCredential, RoomGateway};
use crate::providers::{RetryConfig, Summarizer, SummaryStyle};
use crate::session::SessionRegistry;

pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 500;
pub const DEFAULT_AGENT_JOIN_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CALLER_JOIN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLEANUP_ATTEMPTS: usize = 3;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 2;

/// Destination rooms hold the caller and both agents during the handoff.
const DESTINATION_ROOM_CAPACITY: u32 = 3;

#[derive(Debug, Clone)]
pub struct OrchestratorPolicy {
    pub summary_retry: RetryConfig,
    pub summary_style: SummaryStyle,
    pub summary_max_tokens: u32,
    pub agent_join_timeout: Duration,
    pub caller_join_timeout: Duration,
    pub cleanup_attempts: usize,
    pub cleanup_interval: Duration,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            summary_retry: RetryConfig::default(),
            summary_style: SummaryStyle::default(),
            summary_max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
            agent_join_timeout: Duration::from_secs(DEFAULT_AGENT_JOIN_TIMEOUT_SECS),
            caller_join_timeout: Duration::from_secs(DEFAULT_CALLER_JOIN_TIMEOUT_SECS),
            cleanup_attempts: DEFAULT_CLEANUP_ATTEMPTS,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl OrchestratorPolicy {
    pub fn from_config() -> Self {
        let config = Config::global();
        Self {
            summary_retry: RetryConfig::from_config(),
            summary_style: config
                .get_param::<String>("SWITCHBOARD_SUMMARY_STYLE")
                .ok()
                .and_then(|style| style.parse().ok())
                .unwrap_or_default(),
            summary_max_tokens: config
                .get_param("SWITCHBOARD_SUMMARY_MAX_TOKENS")
                .unwrap_or(DEFAULT_SUMMARY_MAX_TOKENS),
            agent_join_timeout: Duration::from_secs(
                config
                    .get_param("SWITCHBOARD_AGENT_JOIN_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_AGENT_JOIN_TIMEOUT_SECS),
            ),
            caller_join_timeout: Duration::from_secs(
                config
                    .get_param("SWITCHBOARD_CALLER_JOIN_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_CALLER_JOIN_TIMEOUT_SECS),
            ),
            cleanup_attempts: config
                .get_param("SWITCHBOARD_CLEANUP_ATTEMPTS")
                .unwrap_or(DEFAULT_CLEANUP_ATTEMPTS),
            cleanup_interval: Duration::from_secs(
                config
                    .get_param("SWITCHBOARD_CLEANUP_INTERVAL_SECS")
                    .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
            ),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    sessions: Arc<SessionRegistry>,
    store: Arc<TransferStore>,
    gateway: Arc<dyn RoomGateway>,
    summarizer: Arc<dyn Summarizer>,
    policy: OrchestratorPolicy,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        store: Arc<TransferStore>,
        gateway: Arc<dyn RoomGateway>,
        summarizer: Arc<dyn Summarizer>,
        policy: OrchestratorPolicy,
    ) -> Self {
        Self {
            sessions,
            store,
            gateway,
            summarizer,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<TransferStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Start a warm transfer for `session_id`.
    ///
    /// Creates the instance, requests the destination room, and kicks off
    /// summary generation. Returns the instance in `ROOM_READY`, or `FAILED`
    /// readable from the store when the room platform let us down.
    #[tracing::instrument(skip(self, context_blob))]
    pub async fn initiate(
        &self,
        session_id: &str,
        source_agent_id: &str,
        target_agent_id: &str,
        context_blob: String,
    ) -> Result<TransferInstance, TransferError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| TransferError::SessionNotFound(session_id.to_string()))?;
        if session.current_agent_id != source_agent_id {
            return Err(TransferError::SourceAgentMismatch {
                session_id: session_id.to_string(),
                agent_id: source_agent_id.to_string(),
            });
        }

        let instance = self.store.begin(TransferInstance::new(
            session_id,
            source_agent_id,
            target_agent_id,
            context_blob,
        ))?;
        info!(transfer_id = %instance.transfer_id, session_id, "transfer initiated");

        let room_name = format!("transfer-{}", instance.transfer_id);
        match self
            .gateway
            .create_room(&room_name, DESTINATION_ROOM_CAPACITY)
            .await
        {
            Ok(room) => {
                let applied = self.store.apply_if(
                    &instance.transfer_id,
                    TransferState::Initiated,
                    instance.version,
                    |inst| {
                        inst.state = TransferState::RoomReady;
                        inst.destination_room_id = Some(room.name.clone());
                    },
                );
                match applied {
                    Ok(updated) => {
                        self.spawn_summary_generation(updated.transfer_id.clone());
                        Ok(updated)
                    }
                    Err(err) => {
                        // Cancelled while the room was being created: the
                        // fresh room would leak, so tear it down.
                        debug!(transfer_id = %instance.transfer_id, "discarding room for a transfer that moved on");
                        self.spawn_room_teardown(room.name);
                        Err(err)
                    }
                }
            }
            Err(gateway_err) => {
                warn!(transfer_id = %instance.transfer_id, error = %gateway_err, "destination room creation failed");
                let _ = self.store.apply_if(
                    &instance.transfer_id,
                    TransferState::Initiated,
                    instance.version,
                    |inst| inst.fail(gateway_err.code()),
                );
                Err(gateway_err.into())
            }
        }
    }

    /// Commit the transfer: bridge the caller into the destination room and
    /// release the old room. Valid only from `AGENT_JOINED`.
    #[tracing::instrument(skip(self))]
    pub async fn complete(
        &self,
        transfer_id: &str,
    ) -> Result<(TransferInstance, RoomCredential), TransferError> {
        let snapshot = self
            .store
            .get(transfer_id)
            .ok_or_else(|| TransferError::TransferNotFound(transfer_id.to_string()))?;
        if snapshot.state != TransferState::AgentJoined {
            return Err(TransferError::InvalidStateTransition {
                transfer_id: transfer_id.to_string(),
                state: snapshot.state,
            });
        }
        let Some(destination) = snapshot.destination_room_id.clone() else {
            // AGENT_JOINED implies a destination room; reaching this means
            // the instance record is inconsistent.
            return Err(TransferError::InvalidStateTransition {
                transfer_id: transfer_id.to_string(),
                state: snapshot.state,
            });
        };
        let session = self
            .sessions
            .get(&snapshot.session_id)
            .ok_or_else(|| TransferError::SessionNotFound(snapshot.session_id.clone()))?;
        let caller_identity = session.session_id.clone();

        // (a) credential for the caller.
        let credential = match self
            .gateway
            .issue_credential(&destination, &caller_identity, ParticipantRole::Caller)
            .await
        {
            Ok(credential) => credential,
            Err(err) => {
                return Err(match self.apply_failure(&snapshot, err.code()) {
                    Ok(_) => err.into(),
                    // A concurrent cancel settled the instance first; report
                    // the state it produced.
                    Err(lost) => lost,
                });
            }
        };

        // (b) wait for the caller to actually arrive.
        let joined = self
            .gateway
            .await_participant(&destination, &caller_identity, self.policy.caller_join_timeout)
            .await
            .unwrap_or(false);
        if !joined {
            let err = TransferError::CallerJoinTimeout(self.policy.caller_join_timeout);
            return Err(match self.apply_failure(&snapshot, err.code()) {
                Ok(_) => err,
                Err(lost) => lost,
            });
        }

        // (c) the commit point: repoint the session and mark the instance
        // COMPLETED in one step, so the agent changes iff the transfer
        // completed and a racing cancel cannot interleave.
        let sessions = Arc::clone(&self.sessions);
        let committed = self.store.update(transfer_id, |inst| {
            if inst.state != TransferState::AgentJoined || inst.version != snapshot.version {
                return Err(TransferError::InvalidStateTransition {
                    transfer_id: inst.transfer_id.clone(),
                    state: inst.state,
                });
            }
            if !sessions.commit_transfer(&inst.session_id, &inst.target_agent_id, &destination) {
                return Err(TransferError::SessionNotFound(inst.session_id.clone()));
            }
            inst.state = TransferState::Completed;
            Ok(())
        })?;
        info!(transfer_id, destination_room = %destination, "transfer committed");

        // (d) post-commit: release the old room. Never rolled back, since
        // the caller has already moved; failures retry and become warnings.
        self.spawn_old_room_cleanup(
            committed.transfer_id.clone(),
            session.origin_room_id,
            caller_identity,
            committed.source_agent_id.clone(),
        );

        Ok((committed, credential))
    }

    /// Abort a transfer from any non-terminal state. The call session is
    /// left untouched; the destination room, if created, is torn down.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, transfer_id: &str) -> Result<TransferInstance, TransferError> {
        let cancelled = self.store.update(transfer_id, |inst| {
            inst.state = TransferState::Cancelled;
            Ok(())
        })?;
        info!(transfer_id, "transfer cancelled");
        if let Some(room) = cancelled.destination_room_id.clone() {
            self.spawn_room_teardown(room);
        }
        Ok(cancelled)
    }

    /// An agent dropped off the platform. If it was the source agent of the
    /// session's active transfer, the transfer is implicitly cancelled.
    pub async fn handle_agent_disconnect(
        &self,
        session_id: &str,
        agent_id: &str,
    ) -> Option<TransferInstance> {
        let transfer_id = self.store.active_transfer_id(session_id)?;
        let snapshot = self.store.get(&transfer_id)?;
        if snapshot.source_agent_id != agent_id {
            return None;
        }
        info!(session_id, agent_id, %transfer_id, "source agent disconnected; cancelling transfer");
        self.cancel(&transfer_id).await.ok()
    }

    /// Re-run summary generation for a transfer that is past room creation.
    /// An existing summary is only ever replaced by a fresh one.
    pub async fn regenerate_summary(
        &self,
        transfer_id: &str,
    ) -> Result<TransferInstance, TransferError> {
        self.run_summary_generation(transfer_id).await
    }

    fn spawn_summary_generation(&self, transfer_id: String) {
        let this = self.clone();
        let _ = tokio::spawn(async move {
            if let Err(err) = this.run_summary_generation(&transfer_id).await {
                debug!(%transfer_id, "summary generation abandoned: {err}");
            }
        });
    }

    /// Bounded summarization attempts with backoff. Summary failures never
    /// fail the transfer: after the last attempt the instance proceeds to
    /// `SUMMARY_READY` with no summary and the degraded flag set.
    async fn run_summary_generation(
        &self,
        transfer_id: &str,
    ) -> Result<TransferInstance, TransferError> {
        let snapshot = self
            .store
            .get(transfer_id)
            .ok_or_else(|| TransferError::TransferNotFound(transfer_id.to_string()))?;
        if !matches!(
            snapshot.state,
            TransferState::RoomReady | TransferState::SummaryReady
        ) {
            return Err(TransferError::InvalidStateTransition {
                transfer_id: transfer_id.to_string(),
                state: snapshot.state,
            });
        }

        let system = self.policy.summary_style.system_prompt();
        let mut attempt = 1usize;
        let summary = loop {
            match self
                .summarizer
                .summarize(&system, &snapshot.context_blob, self.policy.summary_max_tokens)
                .await
            {
                Ok(text) => break Some(text),
                Err(err) if attempt < self.policy.summary_retry.max_attempts => {
                    let delay = err
                        .retry_delay()
                        .unwrap_or_else(|| self.policy.summary_retry.delay_for(attempt));
                    warn!(
                        transfer_id,
                        attempt,
                        error = %err,
                        "summary generation failed; retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;

                    // Bail out early if the transfer moved on while backing off.
                    let current = self.store.get(transfer_id).ok_or_else(|| {
                        TransferError::TransferNotFound(transfer_id.to_string())
                    })?;
                    if current.state != snapshot.state || current.version != snapshot.version {
                        debug!(transfer_id, "transfer moved on during summary backoff; discarding");
                        return Err(TransferError::InvalidStateTransition {
                            transfer_id: transfer_id.to_string(),
                            state: current.state,
                        });
                    }
                }
                Err(err) => {
                    warn!(
                        transfer_id,
                        error = %err,
                        "summary generation exhausted its attempts; handing off without a summary"
                    );
                    break None;
                }
            }
        };

        let entering_summary_ready = snapshot.state == TransferState::RoomReady;
        let updated = self.store.apply_if(
            transfer_id,
            snapshot.state,
            snapshot.version,
            |inst| {
                if summary.is_some() || inst.summary.is_none() {
                    inst.summary_degraded = summary.is_none();
                    inst.summary = summary.clone();
                }
                if entering_summary_ready {
                    inst.state = TransferState::SummaryReady;
                }
            },
        )?;

        if entering_summary_ready {
            self.spawn_target_join_watch(updated.transfer_id.clone());
        }
        Ok(updated)
    }

    fn spawn_target_join_watch(&self, transfer_id: String) {
        let this = self.clone();
        let _ = tokio::spawn(async move {
            this.watch_target_join(&transfer_id).await;
        });
    }

    /// Bounded wait for the target agent to show up in the destination room.
    ///
    /// The apply below validates state only, not the version: a summary
    /// re-trigger bumps the version while the instance stays `SUMMARY_READY`,
    /// and must not invalidate the join outcome.
    async fn watch_target_join(&self, transfer_id: &str) {
        let Some(snapshot) = self.store.get(transfer_id) else {
            return;
        };
        if snapshot.state != TransferState::SummaryReady {
            return;
        }
        let Some(room) = snapshot.destination_room_id.clone() else {
            return;
        };

        let joined = self
            .gateway
            .await_participant(&room, &snapshot.target_agent_id, self.policy.agent_join_timeout)
            .await
            .unwrap_or(false);

        let applied = self.store.update(transfer_id, |inst| {
            if inst.state != TransferState::SummaryReady {
                return Err(TransferError::InvalidStateTransition {
                    transfer_id: inst.transfer_id.clone(),
                    state: inst.state,
                });
            }
            if joined {
                inst.state = TransferState::AgentJoined;
            } else {
                inst.fail("TargetAgentJoinTimeout");
            }
            Ok(())
        });

        match applied {
            Ok(updated) => {
                if joined {
                    info!(transfer_id, target_agent = %snapshot.target_agent_id, "target agent joined");
                } else {
                    warn!(
                        transfer_id,
                        "target agent did not join within {:?}", self.policy.agent_join_timeout
                    );
                    if let Some(room) = updated.destination_room_id.clone() {
                        self.spawn_room_teardown(room);
                    }
                }
            }
            Err(_) => {
                debug!(transfer_id, "discarding join outcome for a transfer that moved on");
            }
        }
    }

    /// Move a pre-commit failure onto the instance, tearing the destination
    /// room down when the transition wins. A lost race means something else
    /// (a cancel, usually) already decided the outcome; the error reports
    /// the state that won.
    fn apply_failure(
        &self,
        snapshot: &TransferInstance,
        reason: &'static str,
    ) -> Result<TransferInstance, TransferError> {
        match self
            .store
            .apply_if(&snapshot.transfer_id, snapshot.state, snapshot.version, |inst| {
                inst.fail(reason)
            }) {
            Ok(updated) => {
                if let Some(room) = updated.destination_room_id.clone() {
                    self.spawn_room_teardown(room);
                }
                Ok(updated)
            }
            Err(err) => {
                debug!(transfer_id = %snapshot.transfer_id, reason, "failure discarded; transfer already settled");
                Err(err)
            }
        }
    }

    fn spawn_room_teardown(&self, room: String) {
        let this = self.clone();
        let _ = tokio::spawn(async move {
            if let Err(err) = this.delete_room_with_retry(&room).await {
                warn!(%room, error = %err, "destination room teardown failed");
            }
        });
    }

    fn spawn_old_room_cleanup(
        &self,
        transfer_id: String,
        old_room: String,
        caller_identity: String,
        source_agent_id: String,
    ) {
        let this = self.clone();
        let _ = tokio::spawn(async move {
            for identity in [caller_identity, source_agent_id] {
                if let Err(err) = this.remove_participant_with_retry(&old_room, &identity).await {
                    warn!(%transfer_id, %old_room, %identity, error = %err, "old-room removal failed");
                    this.store.append_warning(
                        &transfer_id,
                        format!("failed to remove {identity} from {old_room}: {err}"),
                    );
                }
            }
            if let Err(err) = this.delete_room_with_retry(&old_room).await {
                warn!(%transfer_id, %old_room, error = %err, "old-room teardown failed");
                this.store.append_warning(
                    &transfer_id,
                    format!("failed to tear down old room {old_room}: {err}"),
                );
            }
        });
    }

    async fn remove_participant_with_retry(
        &self,
        room: &str,
        identity: &str,
    ) -> Result<(), GatewayError> {
        let mut attempt = 1usize;
        loop {
            match self.gateway.remove_participant(room, identity).await {
                Ok(()) => return Ok(()),
                // Already gone is the outcome we wanted.
                Err(GatewayError::ParticipantNotFound { .. })
                | Err(GatewayError::RoomNotFound(_)) => return Ok(()),
                Err(err) if attempt < self.policy.cleanup_attempts => {
                    attempt += 1;
                    tokio::time::sleep(self.policy.cleanup_interval).await;
                    debug!(room, identity, error = %err, "retrying participant removal");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn delete_room_with_retry(&self, room: &str) -> Result<(), GatewayError> {
        let mut attempt = 1usize;
        loop {
            match self.gateway.delete_room(room).await {
                Ok(()) => return Ok(()),
                Err(GatewayError::RoomNotFound(_)) => return Ok(()),
                Err(err) if attempt < self.policy.cleanup_attempts => {
                    attempt += 1;
                    tokio::time::sleep(self.policy.cleanup_interval).await;
                    debug!(room, error = %err, "retrying room teardown");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
