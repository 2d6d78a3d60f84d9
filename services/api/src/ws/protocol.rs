//! Defines the WebSocket message format between the client and the bridge.

use serde::{Deserialize, Serialize};
use studeo_core::realtime::{LifecycleState, TranscriptEvent};

/// One data-channel message forwarded by the client: the transport's topic
/// tag plus its UTF-8 payload.
#[derive(Deserialize, Debug)]
pub struct DataChannelFrame {
    pub topic: String,
    pub payload: String,
}

/// Updates pushed back to the client as the session evolves.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The agent's lifecycle posture changed.
    StateChanged { state: LifecycleState },
    /// A transcript line was appended.
    Transcript { event: TranscriptEvent },
}
