pub mod errors;
pub mod rooms;
pub mod sessions;
pub mod status;
pub mod summary;
pub mod transfer;

use std::time::Duration;

use axum::{routing::get, Json, Router};
use switchboard::config::Config;
use utoipa::OpenApi;

use crate::state::AppState;

pub const DEFAULT_RETENTION_SECS: u64 = 3600;
const GC_INTERVAL: Duration = Duration::from_secs(60);

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::openapi::ApiDoc::openapi())
}

pub fn configure(state: AppState) -> Router {
    // Terminal transfers are kept for a bounded retention window, then
    // garbage-collected.
    let retention = Duration::from_secs(
        Config::global()
            .get_param("SWITCHBOARD_RETENTION_SECS")
            .unwrap_or(DEFAULT_RETENTION_SECS),
    );
    let gc_store = state.store.clone();
    let _ = tokio::spawn(async move {
        let mut interval = tokio::time::interval(GC_INTERVAL);
        loop {
            let _ = interval.tick().await;
            let removed = gc_store.sweep(retention);
            if removed > 0 {
                tracing::debug!(removed, "garbage-collected terminal transfers");
            }
        }
    });

    Router::new()
        .merge(status::routes(state.clone()))
        .merge(sessions::routes(state.clone()))
        .merge(transfer::routes(state.clone()))
        .merge(summary::routes(state.clone()))
        .merge(rooms::routes(state))
        .route("/api/openapi.json", get(openapi_spec))
}
