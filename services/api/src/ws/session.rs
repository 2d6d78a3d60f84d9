//! Manages the WebSocket connection lifecycle for one data-channel bridge.

use super::protocol::{DataChannelFrame, ServerMessage};
use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use studeo_core::realtime::{Dispatch, RealtimeSession, TranscriptEvent};
use tracing::{info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(handle_socket)
}

/// Main handler for an individual WebSocket connection.
///
/// Each inbound text frame is a JSON [`DataChannelFrame`]; the core
/// protocol layer classifies it and the resulting effect is echoed back to
/// the client. Everything session-scoped lives in the local
/// [`RealtimeSession`], so it is discarded wholesale on disconnect.
#[instrument(name = "data_channel_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket) {
    let session_id: u32 = rand::random();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!("New data channel connection.");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let mut session = RealtimeSession::new();

    while let Some(msg_result) = socket_rx.next().await {
        let ws_msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };
        match ws_msg {
            Message::Text(text) => {
                let Ok(frame) = serde_json::from_str::<DataChannelFrame>(&text) else {
                    // Malformed frames must not take the session down.
                    warn!("Ignoring malformed data channel frame.");
                    continue;
                };
                let effect = session.handle(&frame.topic, frame.payload.as_bytes());
                if let Err(e) = forward_effect(&mut socket_tx, &session, effect).await {
                    warn!("Failed to push update to client: {:?}", e);
                    break;
                }
            }
            Message::Close(_) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    info!(
        transcript_len = session.transcript().len(),
        lifecycle = ?session.lifecycle(),
        "Data channel session closed; session state discarded."
    );
}

/// Pushes the effect of one dispatched frame back to the client.
async fn forward_effect(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    session: &RealtimeSession,
    effect: Dispatch,
) -> Result<()> {
    match effect {
        Dispatch::StateChange(state) => {
            send_msg(socket_tx, ServerMessage::StateChanged { state }).await
        }
        Dispatch::Transcript { .. } => {
            // The session just appended it; forward the stamped event.
            if let Some(event) = session.transcript().last() {
                let event: TranscriptEvent = event.clone();
                send_msg(socket_tx, ServerMessage::Transcript { event }).await?;
            }
            Ok(())
        }
        Dispatch::Ignored => Ok(()),
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
async fn send_msg(socket_tx: &mut SplitSink<WebSocket, Message>, msg: ServerMessage) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
