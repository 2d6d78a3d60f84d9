//! The application-level protocol carried over the realtime data channel.
//!
//! The transport (audio, connection establishment, reconnection) is an
//! external concern; all this layer sees is `(topic, payload)` pairs in
//! arrival order. `dispatch` classifies one such pair without touching any
//! state, and [`RealtimeSession`] folds the resulting transitions into the
//! session's lifecycle value and append-only transcript. Keeping `dispatch`
//! pure means the whole protocol is unit-testable without a live connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Topic tag carrying agent lifecycle announcements.
pub const TOPIC_STATE: &str = "state";
/// Topic tag carrying an utterance spoken by the agent.
pub const TOPIC_AGENT_CHAT: &str = "chat";
/// Topic tag carrying the transcription of a user utterance.
pub const TOPIC_USER_CHAT: &str = "chat_user";

/// The agent's current conversational posture. A session holds exactly one
/// current value; history beyond the latest is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Speaking,
    Thinking,
    #[default]
    Listening,
}

/// Which side of the conversation produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Agent,
    User,
}

/// One line of the session transcript, stamped at arrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// The effect of one inbound data-channel message: at most one lifecycle
/// transition or one transcript append, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    StateChange(LifecycleState),
    Transcript { sender: Sender, text: String },
    Ignored,
}

/// Classifies free-text lifecycle announcements.
///
/// Case-insensitive substring matching, falling through to `Listening`:
/// the remote agent's vocabulary is not contractually fixed, so text this
/// layer does not recognize is treated as the idle posture rather than
/// rejected.
pub fn classify_state(text: &str) -> LifecycleState {
    let lowered = text.to_lowercase();
    if lowered.contains("speaking") {
        LifecycleState::Speaking
    } else if lowered.contains("thinking") {
        LifecycleState::Thinking
    } else {
        LifecycleState::Listening
    }
}

/// Decodes one `(topic, payload)` pair into its protocol effect.
///
/// Unknown topics are ignored so future topics can be added without
/// breaking older consumers. Payloads that are not valid UTF-8 are also
/// ignored; a malformed message must never take the session down.
pub fn dispatch(topic: &str, payload: &[u8]) -> Dispatch {
    let Ok(text) = std::str::from_utf8(payload) else {
        trace!(topic, "dropping non-UTF-8 data channel payload");
        return Dispatch::Ignored;
    };
    match topic {
        TOPIC_STATE => Dispatch::StateChange(classify_state(text)),
        TOPIC_AGENT_CHAT => Dispatch::Transcript {
            sender: Sender::Agent,
            text: text.to_string(),
        },
        TOPIC_USER_CHAT => Dispatch::Transcript {
            sender: Sender::User,
            text: text.to_string(),
        },
        other => {
            trace!(topic = other, "ignoring unrecognized data channel topic");
            Dispatch::Ignored
        }
    }
}

/// Session-scoped protocol state: the current lifecycle value plus the
/// ordered transcript.
///
/// Events are folded in transport delivery order with no reordering or
/// deduplication, and the transcript is never truncated. The whole value is
/// dropped when the transport disconnects; nothing here survives a session.
#[derive(Debug, Default)]
pub struct RealtimeSession {
    lifecycle: LifecycleState,
    transcript: Vec<TranscriptEvent>,
}

impl RealtimeSession {
    /// A fresh session, listening with an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn transcript(&self) -> &[TranscriptEvent] {
        &self.transcript
    }

    /// Dispatches one inbound message and folds its effect into the
    /// session, returning the effect so callers can forward it on.
    pub fn handle(&mut self, topic: &str, payload: &[u8]) -> Dispatch {
        let effect = dispatch(topic, payload);
        self.apply(&effect);
        effect
    }

    /// Applies a previously computed effect. Transcript appends are stamped
    /// with the arrival time here, not corrected against any remote clock.
    pub fn apply(&mut self, effect: &Dispatch) {
        match effect {
            Dispatch::StateChange(next) => self.lifecycle = *next,
            Dispatch::Transcript { sender, text } => self.transcript.push(TranscriptEvent {
                sender: *sender,
                text: text.clone(),
                timestamp: Utc::now(),
            }),
            Dispatch::Ignored => {}
        }
    }
}
