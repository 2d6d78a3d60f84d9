//! Axum Handlers for the REST API
//!
//! Ingestion, listing, standalone extraction, and session-start handlers.
//! `utoipa` doc comments generate the OpenAPI documentation.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::error;

use crate::{
    extractor::OutputPolicy,
    ingest::{IngestError, stage_upload},
    models::{AgentSummary, CreateAgentResponse, ErrorResponse, ProcessResponse, TokenQuery, TokenResponse},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let error = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { error }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// The `file` and `name` fields of an ingestion upload.
struct UploadForm {
    name: Option<String>,
    file: Option<(Option<String>, Bytes)>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        name: None,
        file: None,
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart request: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read `name`: {e}")))?;
                form.name = Some(text);
            }
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read `file`: {e}")))?;
                form.file = Some((filename, data));
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Ingest an uploaded document into the knowledge base.
#[utoipa::path(
    post,
    path = "/agents",
    tag = "Knowledge",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields: `file` (the document) and `name` (display name, required)"
    ),
    responses(
        (status = 201, description = "Agent created", body = CreateAgentResponse),
        (status = 400, description = "Missing or empty `file`/`name`", body = ErrorResponse),
        (status = 500, description = "Extraction or store failure", body = ErrorResponse)
    )
)]
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_upload_form(multipart).await?;
    let name = form
        .name
        .ok_or_else(|| ApiError::BadRequest("the `name` field is required".to_string()))?;
    let (filename, data) = form
        .file
        .ok_or_else(|| ApiError::BadRequest("the `file` field is required".to_string()))?;

    match state
        .ingest
        .create_agent(&name, &data, filename.as_deref())
        .await
    {
        Ok(agent_id) => Ok((
            StatusCode::CREATED,
            Json(CreateAgentResponse {
                success: true,
                agent_id,
            }),
        )),
        Err(IngestError::InvalidInput(message)) => Err(ApiError::BadRequest(message)),
        Err(err) => Err(ApiError::InternalServerError(err.into())),
    }
}

/// List the full knowledge base.
#[utoipa::path(
    get,
    path = "/agents",
    tag = "Knowledge",
    responses(
        (status = 200, description = "Mapping of agent id to record; empty when nothing has been ingested", body = BTreeMap<String, AgentSummary>)
    )
)]
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, AgentSummary>> {
    // An empty knowledge base is a valid state; a read failure degrades to
    // "no agents" rather than erroring, and is logged for the operator.
    match state.store.list().await {
        Ok(records) => Json(
            records
                .into_iter()
                .map(|(id, record)| {
                    (
                        id,
                        AgentSummary {
                            name: record.name,
                            content: record.content,
                        },
                    )
                })
                .collect(),
        ),
        Err(err) => {
            error!("knowledge store listing failed: {:?}", err);
            Json(BTreeMap::new())
        }
    }
}

/// Run the extraction process against an upload without persisting anything.
#[utoipa::path(
    post,
    path = "/process",
    tag = "Knowledge",
    request_body(
        content_type = "multipart/form-data",
        description = "Field: `file` (the document)"
    ),
    responses(
        (status = 200, description = "Extraction result", body = ProcessResponse),
        (status = 400, description = "No file uploaded", body = ErrorResponse),
        (status = 500, description = "Extraction failure", body = ErrorResponse)
    )
)]
pub async fn process_document(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let form = read_upload_form(multipart).await?;
    let (filename, data) = form
        .file
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    // Strict envelope enforcement here: this endpoint exists to exercise
    // the extractor, so malformed output must surface, not pass through.
    let staged = stage_upload(&data, filename.as_deref())?;
    let extraction = state
        .extractor
        .extract(staged.path(), OutputPolicy::Strict)
        .await?;

    Ok(Json(ProcessResponse {
        success: true,
        data: extraction.content,
    }))
}

/// Issue a capability token for a new realtime session.
#[utoipa::path(
    get,
    path = "/token",
    tag = "Session",
    params(TokenQuery),
    responses(
        (status = 200, description = "Session grant", body = TokenResponse),
        (status = 500, description = "Signing credentials unconfigured", body = ErrorResponse)
    )
)]
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let grant = state.broker.issue(query.agent_id.as_deref())?;
    Ok(Json(TokenResponse {
        token: grant.token,
        room_name: grant.room_name,
        url: state.config.livekit_url.clone(),
    }))
}
