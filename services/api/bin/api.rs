//! Main Entrypoint for the Studeo API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the knowledge store, extractor, ingestion service, and
//!    session broker.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use studeo_api::{
    config::Config,
    extractor::{Extractor, OutputPolicy},
    ingest::IngestService,
    router::create_router,
    state::AppState,
    store::JsonFileStore,
    token::SessionBroker,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let store = Arc::new(JsonFileStore::new(config.store_path.clone()));
    let extractor = Extractor::new(
        config.extractor_interpreter.clone(),
        config.extractor_script.clone(),
        config.extractor_timeout,
    );
    let ingest_policy = if config.extractor_lenient {
        OutputPolicy::Lenient
    } else {
        OutputPolicy::Strict
    };
    let ingest = IngestService::new(extractor.clone(), ingest_policy, store.clone());
    let broker = SessionBroker::new(
        config.livekit_api_key.clone(),
        config.livekit_api_secret.clone(),
        config.token_ttl,
        config.default_agent_id.clone(),
    );
    if config.livekit_api_key.is_none() || config.livekit_api_secret.is_none() {
        info!("LiveKit credentials not configured; session-start requests will fail closed.");
    }

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        store,
        extractor,
        ingest,
        broker,
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        store_path = %config.store_path.display(),
        extractor = %config.extractor_script.display(),
        lenient = config.extractor_lenient,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
