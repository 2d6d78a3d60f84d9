//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{AgentSummary, CreateAgentResponse, ErrorResponse, ProcessResponse, TokenResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Document uploads routinely exceed axum's 2 MB default body limit.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_agent,
        handlers::list_agents,
        handlers::process_document,
        handlers::issue_token,
    ),
    components(
        schemas(CreateAgentResponse, AgentSummary, ProcessResponse, TokenResponse, ErrorResponse)
    ),
    tags(
        (name = "Knowledge", description = "Document ingestion and the per-agent knowledge base"),
        (name = "Session", description = "Realtime session token issuance")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route(
            "/agents",
            get(handlers::list_agents).post(handlers::create_agent),
        )
        .route("/process", post(handlers::process_document))
        .route("/token", get(handlers::issue_token))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
