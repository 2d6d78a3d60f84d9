//! API Models
//!
//! Request and response bodies for the REST surface, annotated for OpenAPI
//! generation with `utoipa`. The wire names (`agentId`, `roomName`) follow
//! the shapes the reference clients already consume.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Successful ingestion of an uploaded document.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CreateAgentResponse {
    pub success: bool,
    #[serde(rename = "agentId")]
    #[schema(example = "history-101")]
    pub agent_id: String,
}

/// One knowledge-base entry as returned by the listing endpoint. The map
/// key carries the id.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct AgentSummary {
    #[schema(example = "History 101")]
    pub name: String,
    pub content: String,
}

/// Query parameters for the session-start endpoint.
#[derive(Deserialize, IntoParams, Debug)]
pub struct TokenQuery {
    /// Knowledge-base subject to bind the session to.
    #[serde(rename = "agentId")]
    #[param(example = "history-101")]
    pub agent_id: Option<String>,
}

/// A freshly issued session grant.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TokenResponse {
    /// Signed, time-bounded access token.
    pub token: String,
    #[serde(rename = "roomName")]
    #[schema(example = "exam-history-101-1756600000000-3fa1")]
    pub room_name: String,
    /// Transport endpoint the client should attach to, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Result of a standalone (non-persisting) extraction run.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ProcessResponse {
    pub success: bool,
    pub data: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
