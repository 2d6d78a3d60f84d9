//! Studeo API Library Crate
//!
//! This library contains all the core logic for the Studeo web service:
//! configuration, the knowledge store, the document extraction invoker, the
//! ingestion pipeline, session token issuance, API handlers, and routing.
//! The `bin/api.rs` binary is a thin wrapper around this library.

pub mod config;
pub mod extractor;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod router;
pub mod state;
pub mod store;
pub mod token;
pub mod ws;
