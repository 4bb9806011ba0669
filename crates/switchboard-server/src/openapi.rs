use switchboard::gateway::{ParticipantRole, RoomCredential, RoomHandle};
use switchboard::providers::SummaryStyle;
use switchboard::session::CallSession;
use switchboard::transfer::{TransferInstance, TransferState};
use utoipa::OpenApi;

use crate::routes::errors::ErrorResponse;
use crate::routes::rooms::{
    CreateRoomRequest, MessageResponse, RoomListResponse, TokenRequest, TokenResponse,
};
use crate::routes::sessions::RegisterSessionRequest;
use crate::routes::status::{HealthResponse, StatsResponse};
use crate::routes::summary::{GenerateSummaryRequest, GenerateSummaryResponse};
use crate::routes::transfer::{
    CancelTransferRequest, CompleteTransferRequest, CompleteTransferResponse,
    InitiateTransferRequest,
};
use crate::state::StoredSummary;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::status::status,
        crate::routes::status::health,
        crate::routes::status::stats,
        crate::routes::sessions::register_session,
        crate::routes::sessions::remove_session,
        crate::routes::transfer::initiate_transfer,
        crate::routes::transfer::get_transfer,
        crate::routes::transfer::complete_transfer,
        crate::routes::transfer::cancel_transfer,
        crate::routes::summary::generate_summary,
        crate::routes::summary::get_summary,
        crate::routes::rooms::create_room,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::delete_room,
        crate::routes::rooms::issue_token,
    ),
    components(schemas(
        ErrorResponse,
        CallSession,
        TransferInstance,
        TransferState,
        RoomHandle,
        RoomCredential,
        ParticipantRole,
        SummaryStyle,
        StoredSummary,
        HealthResponse,
        StatsResponse,
        RegisterSessionRequest,
        InitiateTransferRequest,
        CompleteTransferRequest,
        CancelTransferRequest,
        CompleteTransferResponse,
        GenerateSummaryRequest,
        GenerateSummaryResponse,
        CreateRoomRequest,
        RoomListResponse,
        MessageResponse,
        TokenRequest,
        TokenResponse,
    )),
    tags(
        (name = "transfer", description = "Warm-transfer orchestration"),
        (name = "rooms", description = "Room platform pass-through"),
    )
)]
pub struct ApiDoc;
