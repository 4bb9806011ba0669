//! End-to-end orchestration scenarios against the fixture room platform and
//! fixture summarizer.

use std::sync::Arc;
use std::time::Duration;

use switchboard::gateway::{FixtureGateway, GatewayError};
use switchboard::providers::{FixtureSummarizer, RetryConfig, SummarizerError};
use switchboard::session::SessionRegistry;
use switchboard::transfer::{
    Orchestrator, OrchestratorPolicy, TransferError, TransferInstance, TransferState,
    TransferStore,
};

const SESSION: &str = "s1";
const ORIGIN_ROOM: &str = "room-1";
const AGENT_A: &str = "agent-a";
const AGENT_B: &str = "agent-b";

struct Harness {
    orchestrator: Orchestrator,
    gateway: FixtureGateway,
    store: Arc<TransferStore>,
    sessions: Arc<SessionRegistry>,
}

fn fast_policy() -> OrchestratorPolicy {
    OrchestratorPolicy {
        summary_retry: RetryConfig {
            max_attempts: 3,
            initial_interval_ms: 10,
            backoff_multiplier: 1.0,
            max_interval_ms: 20,
        },
        agent_join_timeout: Duration::from_secs(5),
        caller_join_timeout: Duration::from_secs(2),
        cleanup_attempts: 2,
        cleanup_interval: Duration::from_millis(10),
        ..OrchestratorPolicy::default()
    }
}

fn harness_with(summarizer: Arc<FixtureSummarizer>, policy: OrchestratorPolicy) -> Harness {
    let gateway = FixtureGateway::new();
    gateway.seed_room(ORIGIN_ROOM);
    gateway.join(ORIGIN_ROOM, SESSION);
    gateway.join(ORIGIN_ROOM, AGENT_A);
    gateway.auto_join_on_credential();

    let sessions = Arc::new(SessionRegistry::new());
    let _ = sessions.register(SESSION, ORIGIN_ROOM, AGENT_A);

    let store = Arc::new(TransferStore::new());
    let orchestrator = Orchestrator::new(
        Arc::clone(&sessions),
        Arc::clone(&store),
        Arc::new(gateway.clone()),
        summarizer,
        policy,
    );

    Harness {
        orchestrator,
        gateway,
        store,
        sessions,
    }
}

fn harness(summarizer: FixtureSummarizer) -> Harness {
    harness_with(Arc::new(summarizer), fast_policy())
}

async fn wait_for_state(
    store: &TransferStore,
    transfer_id: &str,
    state: TransferState,
) -> TransferInstance {
    for _ in 0..400 {
        if let Some(instance) = store.get(transfer_id) {
            if instance.state == state {
                return instance;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("transfer {transfer_id} never reached {state}");
}

async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn warm_transfer_happy_path() {
    let h = harness(FixtureSummarizer::always_ok("Caller has a billing question"));

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "caller asked about billing".to_string())
        .await
        .unwrap();
    assert_eq!(instance.state, TransferState::RoomReady);
    let destination = instance.destination_room_id.clone().unwrap();
    assert!(h.gateway.has_room(&destination));

    let instance = wait_for_state(&h.store, &instance.transfer_id, TransferState::SummaryReady).await;
    assert_eq!(instance.summary.as_deref(), Some("Caller has a billing question"));
    assert!(!instance.summary_degraded);

    h.gateway
        .schedule_join(&destination, AGENT_B, Duration::from_millis(50));
    let instance = wait_for_state(&h.store, &instance.transfer_id, TransferState::AgentJoined).await;

    let (completed, credential) = h.orchestrator.complete(&instance.transfer_id).await.unwrap();
    assert_eq!(completed.state, TransferState::Completed);
    assert_eq!(credential.identity, SESSION);
    assert_eq!(credential.room, destination);

    let session = h.sessions.get(SESSION).unwrap();
    assert_eq!(session.current_agent_id, AGENT_B);
    assert_eq!(session.origin_room_id, destination);

    // The old room is released: caller and source agent removed, room gone.
    let gateway = h.gateway.clone();
    wait_until(
        || gateway.deleted_rooms().contains(&ORIGIN_ROOM.to_string()),
        "old room teardown",
    )
    .await;
    let removed = h.gateway.removed_participants();
    assert!(removed.contains(&(ORIGIN_ROOM.to_string(), SESSION.to_string())));
    assert!(removed.contains(&(ORIGIN_ROOM.to_string(), AGENT_A.to_string())));
}

#[tokio::test]
async fn concurrent_initiates_exactly_one_wins() {
    let h = harness(FixtureSummarizer::always_ok("summary"));

    let (first, second) = tokio::join!(
        h.orchestrator
            .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string()),
        h.orchestrator
            .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string()),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        TransferError::SessionHasActiveTransfer { .. }
    ));
}

#[tokio::test]
async fn initiate_requires_the_connected_agent() {
    let h = harness(FixtureSummarizer::always_ok("summary"));

    let err = h
        .orchestrator
        .initiate(SESSION, AGENT_B, AGENT_A, "context".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::SourceAgentMismatch { .. }));

    let err = h
        .orchestrator
        .initiate("missing", AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::SessionNotFound(_)));
}

#[tokio::test]
async fn room_creation_failure_fails_the_transfer() {
    let h = harness(FixtureSummarizer::always_ok("summary"));
    h.gateway
        .fail_next_create(GatewayError::Unavailable("maintenance".to_string()));

    let err = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GatewayUnavailable");

    // The instance is readable in FAILED, and the session slot is free again.
    let failed = h.store.snapshot().into_iter().next().unwrap();
    assert_eq!(failed.state, TransferState::Failed);
    assert_eq!(failed.failure_reason.as_deref(), Some("GatewayUnavailable"));
    assert!(h.store.active_transfer_id(SESSION).is_none());
}

#[tokio::test]
async fn complete_outside_agent_joined_mutates_nothing() {
    let h = harness(FixtureSummarizer::always_ok("summary"));

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();
    let instance = wait_for_state(&h.store, &instance.transfer_id, TransferState::SummaryReady).await;

    let err = h.orchestrator.complete(&instance.transfer_id).await.unwrap_err();
    assert!(matches!(
        err,
        TransferError::InvalidStateTransition {
            state: TransferState::SummaryReady,
            ..
        }
    ));

    let current = h.store.get(&instance.transfer_id).unwrap();
    assert_eq!(current.state, TransferState::SummaryReady);
    assert_eq!(h.sessions.get(SESSION).unwrap().current_agent_id, AGENT_A);
}

#[tokio::test]
async fn failing_summarizer_never_blocks_the_handoff() {
    let summarizer =
        FixtureSummarizer::always_err(SummarizerError::Unavailable("down".to_string()));
    let h = harness(summarizer);

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();

    let instance = wait_for_state(&h.store, &instance.transfer_id, TransferState::SummaryReady).await;
    assert_eq!(instance.summary, None);
    assert!(instance.summary_degraded);

    let destination = instance.destination_room_id.clone().unwrap();
    h.gateway.join(&destination, AGENT_B);
    let instance = wait_for_state(&h.store, &instance.transfer_id, TransferState::AgentJoined).await;

    let (completed, _credential) = h.orchestrator.complete(&instance.transfer_id).await.unwrap();
    assert_eq!(completed.state, TransferState::Completed);
    assert_eq!(completed.summary, None);
    assert_eq!(h.sessions.get(SESSION).unwrap().current_agent_id, AGENT_B);
}

#[tokio::test]
async fn summarizer_is_retried_up_to_the_attempt_bound() {
    let summarizer = Arc::new(FixtureSummarizer::always_err(SummarizerError::RateLimited {
        details: "slow down".to_string(),
        retry_delay: Some(Duration::from_millis(5)),
    }));
    let h = harness_with(Arc::clone(&summarizer), fast_policy());

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();
    let _ = wait_for_state(&h.store, &instance.transfer_id, TransferState::SummaryReady).await;

    // Three attempts (the policy bound), no more.
    assert_eq!(summarizer.calls(), 3);
}

#[tokio::test]
async fn target_agent_join_timeout_fails_the_transfer() {
    let mut policy = fast_policy();
    policy.agent_join_timeout = Duration::from_millis(300);
    let h = harness_with(Arc::new(FixtureSummarizer::always_ok("summary")), policy);

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();
    let destination = instance.destination_room_id.clone().unwrap();

    // Nobody joins the destination room.
    let failed = wait_for_state(&h.store, &instance.transfer_id, TransferState::Failed).await;
    assert_eq!(failed.failure_reason.as_deref(), Some("TargetAgentJoinTimeout"));
    assert_eq!(h.sessions.get(SESSION).unwrap().current_agent_id, AGENT_A);

    let gateway = h.gateway.clone();
    wait_until(
        || gateway.deleted_rooms().contains(&destination),
        "destination room teardown",
    )
    .await;
}

#[tokio::test]
async fn cancel_tears_down_the_room_and_leaves_the_session_alone() {
    let h = harness(FixtureSummarizer::always_ok("summary"));

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();
    let destination = instance.destination_room_id.clone().unwrap();

    let cancelled = h.orchestrator.cancel(&instance.transfer_id).await.unwrap();
    assert_eq!(cancelled.state, TransferState::Cancelled);
    assert_eq!(h.sessions.get(SESSION).unwrap().current_agent_id, AGENT_A);

    let gateway = h.gateway.clone();
    wait_until(
        || gateway.deleted_rooms().contains(&destination),
        "destination room teardown",
    )
    .await;

    // The session's active slot is free for the next attempt.
    assert!(h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "again".to_string())
        .await
        .is_ok());
}

#[tokio::test]
async fn cancel_discards_an_in_flight_summary() {
    let summarizer =
        FixtureSummarizer::always_ok("late summary").with_latency(Duration::from_millis(300));
    let h = harness(summarizer);

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();
    assert_eq!(instance.state, TransferState::RoomReady);

    let cancelled = h.orchestrator.cancel(&instance.transfer_id).await.unwrap();
    assert_eq!(cancelled.state, TransferState::Cancelled);

    // The summary lands after the cancel and must be discarded against the
    // terminal state.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let current = h.store.get(&instance.transfer_id).unwrap();
    assert_eq!(current.state, TransferState::Cancelled);
    assert_eq!(current.summary, None);
}

#[tokio::test]
async fn complete_and_cancel_race_has_exactly_one_winner() {
    let h = harness(FixtureSummarizer::always_ok("summary"));

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();
    let destination = instance.destination_room_id.clone().unwrap();
    h.gateway.join(&destination, AGENT_B);
    let instance = wait_for_state(&h.store, &instance.transfer_id, TransferState::AgentJoined).await;

    let (completed, cancelled) = tokio::join!(
        h.orchestrator.complete(&instance.transfer_id),
        h.orchestrator.cancel(&instance.transfer_id),
    );

    let session = h.sessions.get(SESSION).unwrap();
    match (completed, cancelled) {
        (Ok((instance, _)), Err(TransferError::InvalidStateTransition { state, .. })) => {
            assert_eq!(instance.state, TransferState::Completed);
            assert_eq!(state, TransferState::Completed);
            assert_eq!(session.current_agent_id, AGENT_B);
        }
        (Err(TransferError::InvalidStateTransition { state, .. }), Ok(instance)) => {
            assert_eq!(instance.state, TransferState::Cancelled);
            assert_eq!(state, TransferState::Cancelled);
            assert_eq!(session.current_agent_id, AGENT_A);
        }
        (completed, cancelled) => {
            panic!("expected exactly one winner, got {completed:?} / {cancelled:?}")
        }
    }
}

#[tokio::test]
async fn source_agent_disconnect_cancels_the_active_transfer() {
    let h = harness(FixtureSummarizer::always_ok("summary"));

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();

    // Some other agent disconnecting is not our problem.
    assert!(h
        .orchestrator
        .handle_agent_disconnect(SESSION, "agent-z")
        .await
        .is_none());

    let cancelled = h
        .orchestrator
        .handle_agent_disconnect(SESSION, AGENT_A)
        .await
        .unwrap();
    assert_eq!(cancelled.state, TransferState::Cancelled);
    assert_eq!(cancelled.transfer_id, instance.transfer_id);
    assert_eq!(h.sessions.get(SESSION).unwrap().current_agent_id, AGENT_A);
}

#[tokio::test]
async fn regenerate_replaces_a_degraded_summary() {
    let summarizer = FixtureSummarizer::new(
        vec![
            switchboard::providers::FixtureOutcome::Error(SummarizerError::Unavailable(
                "down".to_string(),
            )),
            switchboard::providers::FixtureOutcome::Error(SummarizerError::Unavailable(
                "down".to_string(),
            )),
            switchboard::providers::FixtureOutcome::Error(SummarizerError::Unavailable(
                "down".to_string(),
            )),
        ],
        switchboard::providers::FixtureOutcome::Text("recovered summary".to_string()),
    );
    let h = harness(summarizer);

    let instance = h
        .orchestrator
        .initiate(SESSION, AGENT_A, AGENT_B, "context".to_string())
        .await
        .unwrap();
    let degraded = wait_for_state(&h.store, &instance.transfer_id, TransferState::SummaryReady).await;
    assert!(degraded.summary_degraded);

    let refreshed = h
        .orchestrator
        .regenerate_summary(&instance.transfer_id)
        .await
        .unwrap();
    assert_eq!(refreshed.summary.as_deref(), Some("recovered summary"));
    assert!(!refreshed.summary_degraded);
    assert_eq!(refreshed.state, TransferState::SummaryReady);
}
