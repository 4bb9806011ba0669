//! Pass-through convenience over the room gateway; not part of the
//! orchestration core.

use axum::extract::{Path, State};
use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use switchboard::gateway::{ParticipantRole, RoomCredential, RoomHandle};
use utoipa::ToSchema;

use super::errors::{self, ApiError, ErrorResponse};
use crate::state::AppState;

const DEFAULT_ROOM_CAPACITY: u32 = 5;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_name: String,
    #[serde(default)]
    pub max_participants: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomListResponse {
    pub rooms: Vec<RoomHandle>,
    pub total_rooms: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub identity: String,
    pub room_id: String,
    #[serde(default)]
    pub role: Option<ParticipantRole>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub credential: RoomCredential,
}

#[utoipa::path(post, path = "/api/create-room",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomHandle),
        (status = 409, description = "Name already in use", body = ErrorResponse),
        (status = 502, description = "Room platform failure", body = ErrorResponse),
    )
)]
pub(crate) async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<RoomHandle>, ApiError> {
    let capacity = request.max_participants.unwrap_or(DEFAULT_ROOM_CAPACITY);
    state
        .gateway
        .create_room(&request.room_name, capacity)
        .await
        .map(Json)
        .map_err(|err| errors::gateway_error(&err))
}

#[utoipa::path(get, path = "/api/rooms",
    responses(
        (status = 200, description = "Active rooms", body = RoomListResponse),
        (status = 502, description = "Room platform failure", body = ErrorResponse),
    )
)]
pub(crate) async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<RoomListResponse>, ApiError> {
    let rooms = state
        .gateway
        .list_rooms()
        .await
        .map_err(|err| errors::gateway_error(&err))?;
    let total_rooms = rooms.len();
    Ok(Json(RoomListResponse { rooms, total_rooms }))
}

#[utoipa::path(delete, path = "/api/rooms/{room_name}",
    params(("room_name" = String, Path, description = "Room name")),
    responses(
        (status = 200, description = "Room deleted", body = MessageResponse),
        (status = 404, description = "No such room", body = ErrorResponse),
    )
)]
pub(crate) async fn delete_room(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .gateway
        .delete_room(&room_name)
        .await
        .map_err(|err| errors::gateway_error(&err))?;
    Ok(Json(MessageResponse {
        message: format!("room {room_name} deleted"),
    }))
}

#[utoipa::path(post, path = "/api/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Join credential issued", body = TokenResponse),
        (status = 404, description = "No such room", body = ErrorResponse),
    )
)]
pub(crate) async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let role = request.role.unwrap_or(ParticipantRole::Agent);
    let credential = state
        .gateway
        .issue_credential(&request.room_id, &request.identity, role)
        .await
        .map_err(|err| errors::gateway_error(&err))?;
    Ok(Json(TokenResponse { credential }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/create-room", post(create_room))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/{room_name}", delete(delete_room))
        .route("/api/token", post(issue_token))
        .with_state(state)
}
