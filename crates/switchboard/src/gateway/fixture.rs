//! Deterministic in-memory room platform for hermetic tests.
//!
//! Rooms and participants live in process memory; tests script platform-side
//! behavior (failures, joins) and assert on the recorded interactions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::errors::GatewayError;
use super::{ParticipantInfo, ParticipantRole, RoomCredential, RoomGateway, RoomHandle};

#[derive(Default)]
struct Inner {
    rooms: BTreeMap<String, BTreeSet<String>>,
    fail_next_create: Option<GatewayError>,
    auto_join_on_credential: bool,
    deleted_rooms: Vec<String>,
    removed_participants: Vec<(String, String)>,
    issued_credentials: Vec<RoomCredential>,
}

#[derive(Clone, Default)]
pub struct FixtureGateway {
    inner: Arc<Mutex<Inner>>,
}

impl FixtureGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a room, as if it already existed on the platform.
    pub fn seed_room(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.rooms.entry(name.to_string()).or_default();
    }

    /// The next `create_room` call fails with `err`.
    pub fn fail_next_create(&self, err: GatewayError) {
        self.inner.lock().unwrap().fail_next_create = Some(err);
    }

    /// Participants join as soon as a credential is issued for them, as a
    /// cooperative client would.
    pub fn auto_join_on_credential(&self) {
        self.inner.lock().unwrap().auto_join_on_credential = true;
    }

    /// Platform-side join, immediate.
    pub fn join(&self, room: &str, identity: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(identity.to_string());
    }

    /// Platform-side join after a delay.
    pub fn schedule_join(&self, room: &str, identity: &str, after: Duration) {
        let this = self.clone();
        let room = room.to_string();
        let identity = identity.to_string();
        let _ = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            this.join(&room, &identity);
        });
    }

    pub fn has_room(&self, name: &str) -> bool {
        self.inner.lock().unwrap().rooms.contains_key(name)
    }

    pub fn participants_in(&self, room: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .rooms
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn deleted_rooms(&self) -> Vec<String> {
        self.inner.lock().unwrap().deleted_rooms.clone()
    }

    pub fn removed_participants(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().removed_participants.clone()
    }

    pub fn issued_credentials(&self) -> Vec<RoomCredential> {
        self.inner.lock().unwrap().issued_credentials.clone()
    }
}

#[async_trait::async_trait]
impl RoomGateway for FixtureGateway {
    async fn create_room(
        &self,
        name: &str,
        _max_participants: u32,
    ) -> Result<RoomHandle, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.fail_next_create.take() {
            return Err(err);
        }
        if inner.rooms.contains_key(name) {
            return Err(GatewayError::NameConflict(name.to_string()));
        }
        let _ = inner.rooms.insert(name.to_string(), BTreeSet::new());
        Ok(RoomHandle {
            name: name.to_string(),
            sid: Some(format!("fixture-{name}")),
            num_participants: Some(0),
            created_at: None,
        })
    }

    async fn list_rooms(&self) -> Result<Vec<RoomHandle>, GatewayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rooms
            .iter()
            .map(|(name, participants)| RoomHandle {
                name: name.clone(),
                sid: Some(format!("fixture-{name}")),
                num_participants: Some(participants.len() as u32),
                created_at: None,
            })
            .collect())
    }

    async fn delete_room(&self, room: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.rooms.remove(room).is_none() {
            return Err(GatewayError::RoomNotFound(room.to_string()));
        }
        inner.deleted_rooms.push(room.to_string());
        Ok(())
    }

    async fn issue_credential(
        &self,
        room: &str,
        identity: &str,
        role: ParticipantRole,
    ) -> Result<RoomCredential, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.rooms.contains_key(room) {
            return Err(GatewayError::RoomNotFound(room.to_string()));
        }
        let credential = RoomCredential {
            token: format!("fixture-token-{room}-{identity}-{}", role.as_str()),
            room: room.to_string(),
            identity: identity.to_string(),
            expires_at: None,
        };
        inner.issued_credentials.push(credential.clone());
        if inner.auto_join_on_credential {
            if let Some(participants) = inner.rooms.get_mut(room) {
                let _ = participants.insert(identity.to_string());
            }
        }
        Ok(credential)
    }

    async fn list_participants(&self, room: &str) -> Result<Vec<ParticipantInfo>, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let participants = inner
            .rooms
            .get(room)
            .ok_or_else(|| GatewayError::RoomNotFound(room.to_string()))?;
        Ok(participants
            .iter()
            .map(|identity| ParticipantInfo {
                identity: identity.clone(),
                name: None,
                joined_at: None,
            })
            .collect())
    }

    async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        let participants = inner
            .rooms
            .get_mut(room)
            .ok_or_else(|| GatewayError::RoomNotFound(room.to_string()))?;
        if !participants.remove(identity) {
            return Err(GatewayError::ParticipantNotFound {
                room: room.to_string(),
                identity: identity.to_string(),
            });
        }
        inner
            .removed_participants
            .push((room.to_string(), identity.to_string()));
        Ok(())
    }
}
