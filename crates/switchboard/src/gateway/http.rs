//! HTTP implementation of [`RoomGateway`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::errors::GatewayError;
use super::{ParticipantInfo, ParticipantRole, RoomCredential, RoomGateway, RoomHandle};
use crate::config::Config;

pub const DEFAULT_ROOM_GATEWAY_HOST: &str = "http://localhost:7880";

/// Rooms left empty this long are reclaimed by the platform.
const ROOM_EMPTY_TIMEOUT_SECS: u32 = 300;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HttpRoomGateway {
    client: Client,
    host: String,
}

#[derive(Deserialize)]
struct RoomsResponse {
    rooms: Vec<RoomHandle>,
}

#[derive(Deserialize)]
struct ParticipantsResponse {
    participants: Vec<ParticipantInfo>,
}

impl HttpRoomGateway {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config::global();
        let host: String = config
            .get_param("ROOM_GATEWAY_HOST")
            .unwrap_or_else(|_| DEFAULT_ROOM_GATEWAY_HOST.to_string());
        let api_key: String = config.get_secret("ROOM_GATEWAY_API_KEY")?;
        Self::new(host, &api_key)
    }

    pub fn new(host: impl Into<String>, api_key: &str) -> anyhow::Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let host = host.into();
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.host)
    }

    /// Extract a human-readable detail from an error response body.
    async fn error_detail(response: Response) -> String {
        let status = response.status();
        match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string()),
            Err(_) => status.to_string(),
        }
    }

    async fn map_error(response: Response) -> GatewayError {
        let status = response.status();
        let detail = Self::error_detail(response).await;
        match status {
            StatusCode::CONFLICT => GatewayError::NameConflict(detail),
            StatusCode::NOT_FOUND => GatewayError::RoomNotFound(detail),
            s if s.is_server_error() => GatewayError::Unavailable(detail),
            s => GatewayError::RequestFailed(format!("{s}: {detail}")),
        }
    }
}

#[async_trait::async_trait]
impl RoomGateway for HttpRoomGateway {
    async fn create_room(
        &self,
        name: &str,
        max_participants: u32,
    ) -> Result<RoomHandle, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("v1/rooms"))
            .json(&json!({
                "name": name,
                "maxParticipants": max_participants,
                "emptyTimeoutSecs": ROOM_EMPTY_TIMEOUT_SECS,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }
        Ok(response.json::<RoomHandle>().await?)
    }

    async fn list_rooms(&self) -> Result<Vec<RoomHandle>, GatewayError> {
        let response = self.client.get(self.endpoint("v1/rooms")).send().await?;
        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }
        Ok(response.json::<RoomsResponse>().await?.rooms)
    }

    async fn delete_room(&self, room: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.endpoint(&format!("v1/rooms/{room}")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }
        Ok(())
    }

    async fn issue_credential(
        &self,
        room: &str,
        identity: &str,
        role: ParticipantRole,
    ) -> Result<RoomCredential, GatewayError> {
        let response = self
            .client
            .post(self.endpoint(&format!("v1/rooms/{room}/credentials")))
            .json(&json!({
                "identity": identity,
                "role": role.as_str(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }
        Ok(response.json::<RoomCredential>().await?)
    }

    async fn list_participants(&self, room: &str) -> Result<Vec<ParticipantInfo>, GatewayError> {
        let response = self
            .client
            .get(self.endpoint(&format!("v1/rooms/{room}/participants")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }
        Ok(response.json::<ParticipantsResponse>().await?.participants)
    }

    async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.endpoint(&format!("v1/rooms/{room}/participants/{identity}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::ParticipantNotFound {
                room: room.to_string(),
                identity: identity.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> HttpRoomGateway {
        HttpRoomGateway::new(server.uri(), "test-key").unwrap()
    }

    #[tokio::test]
    async fn create_room_sends_auth_and_parses_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rooms"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"name": "transfer-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "transfer-1",
                "sid": "RM_abc",
            })))
            .mount(&server)
            .await;

        let room = gateway_for(&server).create_room("transfer-1", 3).await.unwrap();
        assert_eq!(room.name, "transfer-1");
        assert_eq!(room.sid.as_deref(), Some("RM_abc"));
    }

    #[tokio::test]
    async fn create_room_conflict_maps_to_name_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rooms"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"message": "room exists"})),
            )
            .mount(&server)
            .await;

        let err = gateway_for(&server).create_room("transfer-1", 3).await.unwrap_err();
        assert_eq!(err, GatewayError::NameConflict("room exists".to_string()));
    }

    #[tokio::test]
    async fn server_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/rooms"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = gateway_for(&server).list_rooms().await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn remove_missing_participant_is_participant_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/rooms/r1/participants/agent-a"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .remove_participant("r1", "agent-a")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::ParticipantNotFound {
                room: "r1".to_string(),
                identity: "agent-a".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn list_participants_parses_identities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/rooms/r1/participants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "participants": [
                    {"identity": "caller-1"},
                    {"identity": "agent-b", "name": "Agent B"},
                ]
            })))
            .mount(&server)
            .await;

        let participants = gateway_for(&server).list_participants("r1").await.unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[1].identity, "agent-b");
    }

    #[tokio::test]
    async fn issue_credential_round_trips() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rooms/r1/credentials"))
            .and(body_partial_json(
                serde_json::json!({"identity": "s1", "role": "caller"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "jwt-token",
                "room": "r1",
                "identity": "s1",
            })))
            .mount(&server)
            .await;

        let credential = gateway_for(&server)
            .issue_credential("r1", "s1", ParticipantRole::Caller)
            .await
            .unwrap();
        assert_eq!(credential.token, "jwt-token");
        assert_eq!(credential.room, "r1");
    }
}
