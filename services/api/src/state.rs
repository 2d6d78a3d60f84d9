//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources the handlers need: the knowledge store, the
//! extraction invoker, the ingestion service, and the session broker.

use crate::config::Config;
use crate::extractor::Extractor;
use crate::ingest::IngestService;
use crate::store::KnowledgeStore;
use crate::token::SessionBroker;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn KnowledgeStore>,
    pub extractor: Extractor,
    pub ingest: IngestService,
    pub broker: SessionBroker,
}
