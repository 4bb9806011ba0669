//! The transfer context store.
//!
//! One lock guards the pair of maps (`by_id`, `active_by_session`) so the
//! at-most-one-active-transfer-per-session invariant is enforced with a
//! single atomic check-and-insert. Each instance then has its own mutex;
//! transitions hold it only for the duration of the mutation, never across
//! an external call; external results come back through [`apply_if`],
//! which re-validates state and version and discards stale results.
//!
//! Lock order: an instance lock may be taken first and the map lock second
//! (terminal transitions release the active pointer), never the reverse.
//!
//! [`apply_if`]: TransferStore::apply_if

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use super::error::TransferError;
use super::types::{TransferInstance, TransferState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Default)]
struct StoreInner {
    by_id: HashMap<String, Arc<Mutex<TransferInstance>>>,
    active_by_session: HashMap<String, String>,
}

#[derive(Default)]
pub struct TransferStore {
    inner: Mutex<StoreInner>,
}

impl TransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-insert: registers `instance` as the session's active
    /// transfer, or reports the transfer already holding that slot.
    pub fn begin(&self, instance: TransferInstance) -> Result<TransferInstance, TransferError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(active) = inner.active_by_session.get(&instance.session_id) {
            return Err(TransferError::SessionHasActiveTransfer {
                session_id: instance.session_id.clone(),
                transfer_id: active.clone(),
            });
        }
        let _ = inner
            .active_by_session
            .insert(instance.session_id.clone(), instance.transfer_id.clone());
        let _ = inner.by_id.insert(
            instance.transfer_id.clone(),
            Arc::new(Mutex::new(instance.clone())),
        );
        Ok(instance)
    }

    fn entry(&self, transfer_id: &str) -> Result<Arc<Mutex<TransferInstance>>, TransferError> {
        self.inner
            .lock()
            .unwrap()
            .by_id
            .get(transfer_id)
            .cloned()
            .ok_or_else(|| TransferError::TransferNotFound(transfer_id.to_string()))
    }

    pub fn get(&self, transfer_id: &str) -> Option<TransferInstance> {
        self.entry(transfer_id)
            .ok()
            .map(|entry| entry.lock().unwrap().clone())
    }

    /// Serialized mutation of one instance. The closure runs under the
    /// per-instance lock and must not block. Terminal instances refuse
    /// further transitions; the caller observes the state that won.
    pub fn update<F>(&self, transfer_id: &str, f: F) -> Result<TransferInstance, TransferError>
    where
        F: FnOnce(&mut TransferInstance) -> Result<(), TransferError>,
    {
        let entry = self.entry(transfer_id)?;
        let mut instance = entry.lock().unwrap();
        if instance.state.is_terminal() {
            return Err(TransferError::InvalidStateTransition {
                transfer_id: transfer_id.to_string(),
                state: instance.state,
            });
        }
        f(&mut instance)?;
        instance.version += 1;
        instance.updated_at = Utc::now();
        if instance.state.is_terminal() {
            self.release_active(&instance.session_id, transfer_id);
        }
        Ok(instance.clone())
    }

    /// Optimistic apply of an external-call result: runs `f` only if the
    /// instance is still at (`expected`, `expected_version`). A moved-on
    /// instance means the result is stale; the error reports the state that
    /// won the race.
    pub fn apply_if<F>(
        &self,
        transfer_id: &str,
        expected: TransferState,
        expected_version: u64,
        f: F,
    ) -> Result<TransferInstance, TransferError>
    where
        F: FnOnce(&mut TransferInstance),
    {
        self.update(transfer_id, |instance| {
            if instance.state != expected || instance.version != expected_version {
                return Err(TransferError::InvalidStateTransition {
                    transfer_id: instance.transfer_id.clone(),
                    state: instance.state,
                });
            }
            f(instance);
            Ok(())
        })
    }

    /// Warnings may attach after completion; post-commit cleanup failures
    /// land here without reopening the instance.
    pub fn append_warning(&self, transfer_id: &str, warning: impl Into<String>) {
        if let Ok(entry) = self.entry(transfer_id) {
            let mut instance = entry.lock().unwrap();
            instance.warnings.push(warning.into());
            instance.updated_at = Utc::now();
        }
    }

    fn release_active(&self, session_id: &str, transfer_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.active_by_session.get(session_id).map(String::as_str) == Some(transfer_id) {
            let _ = inner.active_by_session.remove(session_id);
        }
    }

    pub fn active_transfer_id(&self, session_id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .active_by_session
            .get(session_id)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<TransferInstance> {
        let entries: Vec<_> = self.inner.lock().unwrap().by_id.values().cloned().collect();
        entries
            .iter()
            .map(|entry| entry.lock().unwrap().clone())
            .collect()
    }

    pub fn counts(&self) -> TransferCounts {
        let mut counts = TransferCounts::default();
        for instance in self.snapshot() {
            match instance.state {
                TransferState::Completed => counts.completed += 1,
                TransferState::Failed => counts.failed += 1,
                TransferState::Cancelled => counts.cancelled += 1,
                _ => counts.active += 1,
            }
        }
        counts
    }

    /// Garbage-collect terminal instances older than `retention`.
    pub fn sweep(&self, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let entries: Vec<(String, Arc<Mutex<TransferInstance>>)> = self
            .inner
            .lock()
            .unwrap()
            .by_id
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let stale: Vec<String> = entries
            .into_iter()
            .filter(|(_, entry)| {
                let instance = entry.lock().unwrap();
                instance.state.is_terminal() && instance.updated_at < cutoff
            })
            .map(|(id, _)| id)
            .collect();

        let mut inner = self.inner.lock().unwrap();
        stale
            .into_iter()
            .filter(|id| inner.by_id.remove(id).is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(session: &str) -> TransferInstance {
        TransferInstance::new(session, "agent-a", "agent-b", "context")
    }

    #[test]
    fn begin_enforces_one_active_transfer_per_session() {
        let store = TransferStore::new();
        let first = store.begin(instance("s1")).unwrap();
        let err = store.begin(instance("s1")).unwrap_err();
        assert_eq!(
            err,
            TransferError::SessionHasActiveTransfer {
                session_id: "s1".to_string(),
                transfer_id: first.transfer_id,
            }
        );
        // A different session is unaffected.
        assert!(store.begin(instance("s2")).is_ok());
    }

    #[test]
    fn terminal_transition_releases_the_active_slot() {
        let store = TransferStore::new();
        let first = store.begin(instance("s1")).unwrap();
        let _ = store
            .update(&first.transfer_id, |inst| {
                inst.state = TransferState::Cancelled;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.active_transfer_id("s1"), None);
        assert!(store.begin(instance("s1")).is_ok());
    }

    #[test]
    fn terminal_instances_refuse_updates() {
        let store = TransferStore::new();
        let first = store.begin(instance("s1")).unwrap();
        let _ = store
            .update(&first.transfer_id, |inst| {
                inst.state = TransferState::Cancelled;
                Ok(())
            })
            .unwrap();

        let err = store
            .update(&first.transfer_id, |inst| {
                inst.state = TransferState::Completed;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(
            err,
            TransferError::InvalidStateTransition {
                transfer_id: first.transfer_id,
                state: TransferState::Cancelled,
            }
        );
    }

    #[test]
    fn apply_if_discards_stale_results() {
        let store = TransferStore::new();
        let first = store.begin(instance("s1")).unwrap();

        // A concurrent transition bumps the version.
        let _ = store
            .update(&first.transfer_id, |inst| {
                inst.state = TransferState::RoomReady;
                Ok(())
            })
            .unwrap();

        let err = store
            .apply_if(&first.transfer_id, TransferState::Initiated, first.version, |_| {})
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidStateTransition { .. }));
    }

    #[test]
    fn warnings_attach_to_completed_instances() {
        let store = TransferStore::new();
        let first = store.begin(instance("s1")).unwrap();
        let _ = store
            .update(&first.transfer_id, |inst| {
                inst.state = TransferState::Completed;
                Ok(())
            })
            .unwrap();

        store.append_warning(&first.transfer_id, "cleanup failed");
        let current = store.get(&first.transfer_id).unwrap();
        assert_eq!(current.warnings, vec!["cleanup failed".to_string()]);
        assert_eq!(current.state, TransferState::Completed);
    }

    #[test]
    fn sweep_removes_only_old_terminal_instances() {
        let store = TransferStore::new();
        let done = store.begin(instance("s1")).unwrap();
        let live = store.begin(instance("s2")).unwrap();
        let _ = store
            .update(&done.transfer_id, |inst| {
                inst.state = TransferState::Completed;
                Ok(())
            })
            .unwrap();

        // Nothing is old enough yet.
        assert_eq!(store.sweep(Duration::from_secs(60)), 0);
        // With a zero retention the terminal instance goes, the live one stays.
        assert_eq!(store.sweep(Duration::ZERO), 1);
        assert!(store.get(&done.transfer_id).is_none());
        assert!(store.get(&live.transfer_id).is_some());
    }
}
