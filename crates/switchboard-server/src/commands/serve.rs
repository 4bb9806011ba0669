use std::sync::Arc;

use anyhow::Result;
use switchboard::gateway::HttpRoomGateway;
use switchboard::providers::factory;
use switchboard::transfer::OrchestratorPolicy;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::AppState;
use crate::{configuration, logging, routes};

pub async fn run() -> Result<()> {
    let _guard = logging::setup_logging("switchboardd")?;
    info!("starting switchboardd");

    let settings = configuration::Settings::new()?;

    let gateway = Arc::new(HttpRoomGateway::from_env()?);
    let summarizer = factory::from_config()?;
    info!(provider = summarizer.name(), "summarization provider selected");

    let policy = OrchestratorPolicy::from_config();
    let state = AppState::new(gateway, summarizer, policy);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.socket_addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
