//! WebSocket Data-Channel Bridge
//!
//! Bridges the realtime transport's out-of-band data channel into the core
//! protocol layer. It is structured into submodules for clarity:
//!
//! - `protocol`: the JSON frame format exchanged with the connected client.
//! - `session`: the per-connection lifecycle, from upgrade to teardown.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
