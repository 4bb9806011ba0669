use axum::extract::{Path, State};
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use switchboard::providers::SummaryStyle;
use utoipa::ToSchema;

use super::errors::{self, ApiError, ErrorResponse};
use crate::state::{AppState, StoredSummary};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummaryRequest {
    /// Re-trigger summary generation for an in-flight transfer.
    #[serde(default)]
    pub transfer_id: Option<String>,
    /// Or summarize a standalone context blob as a preview.
    #[serde(default)]
    pub context_blob: Option<String>,
    #[serde(default)]
    pub style: Option<SummaryStyle>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummaryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_id: Option<String>,
    pub summary: Option<String>,
    pub summary_degraded: bool,
}

#[utoipa::path(post, path = "/api/generate-summary",
    request_body = GenerateSummaryRequest,
    responses(
        (status = 200, description = "Summary generated", body = GenerateSummaryResponse),
        (status = 400, description = "Neither transferId nor contextBlob given", body = ErrorResponse),
        (status = 429, description = "Provider rate limit", body = ErrorResponse),
        (status = 502, description = "Provider unavailable", body = ErrorResponse),
    )
)]
pub(crate) async fn generate_summary(
    State(state): State<AppState>,
    Json(request): Json<GenerateSummaryRequest>,
) -> Result<Json<GenerateSummaryResponse>, ApiError> {
    if let Some(transfer_id) = request.transfer_id {
        let instance = state
            .orchestrator
            .regenerate_summary(&transfer_id)
            .await
            .map_err(|err| {
                let current = state.store.get(&transfer_id).map(|i| i.state);
                errors::transfer_error(&err, current)
            })?;
        return Ok(Json(GenerateSummaryResponse {
            transfer_id: Some(instance.transfer_id),
            summary_id: None,
            summary: instance.summary,
            summary_degraded: instance.summary_degraded,
        }));
    }

    let Some(context_blob) = request.context_blob else {
        return Err(errors::bad_request(
            "either transferId or contextBlob is required",
        ));
    };

    let style = request.style.unwrap_or(state.policy.summary_style);
    let summary = state
        .summarizer
        .summarize(
            &style.system_prompt(),
            &context_blob,
            state.policy.summary_max_tokens,
        )
        .await
        .map_err(|err| errors::summarizer_error(&err))?;

    let stored = state.store_summary(summary, style);
    Ok(Json(GenerateSummaryResponse {
        transfer_id: None,
        summary_id: Some(stored.summary_id),
        summary: Some(stored.summary),
        summary_degraded: false,
    }))
}

#[utoipa::path(get, path = "/api/summaries/{summary_id}",
    params(("summary_id" = String, Path, description = "Stored summary id")),
    responses(
        (status = 200, description = "Stored summary", body = StoredSummary),
        (status = 404, description = "No such summary", body = ErrorResponse),
    )
)]
pub(crate) async fn get_summary(
    State(state): State<AppState>,
    Path(summary_id): Path<String>,
) -> Result<Json<StoredSummary>, ApiError> {
    state
        .get_summary(&summary_id)
        .map(Json)
        .ok_or_else(|| errors::not_found(format!("summary {summary_id} not found")))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/generate-summary", post(generate_summary))
        .route("/api/summaries/{summary_id}", get(get_summary))
        .with_state(state)
}
