//! The knowledge-base record type shared by the store and the API layer.

use serde::{Deserialize, Serialize};

use crate::slug::slugify;

/// A single ingested subject. One record per slug; a later ingestion whose
/// name normalizes to the same slug replaces the earlier record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Stable slug derived from `name`; the store key.
    pub id: String,
    /// Display name exactly as given at creation time.
    pub name: String,
    /// Extracted text content, possibly empty.
    pub content: String,
}

impl KnowledgeRecord {
    /// Builds a record with its id derived from the display name.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        let id = slugify(&name);
        Self {
            id,
            name,
            content: content.into(),
        }
    }
}
