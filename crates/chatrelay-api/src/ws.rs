//! WebSocket endpoint: the per-connection accept loop.
//!
//! ## Protocol
//!
//! Client → Server: `{"text": "<message>"}`
//! Server → Client: `{"text": "AI: <first fragment>"}`, then `{"text": "<fragment>"}` ...
//!
//! Every inbound message spawns an independent relay task. The loop never
//! waits on those tasks, so a second message sent before the first reply
//! finishes gets its own reply, and the two may interleave.

use crate::registry::ConnectionHandle;
use crate::relay::relay_message;
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chatrelay_runtime::llm_driver::CompletionRequest;
use chatrelay_types::wire::{ChatMessage, ConnectionId, OutboundFrame};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Frames queued per connection before relays wait on the socket.
const FRAME_BUFFER: usize = 256;

/// GET /ws: upgrade to a chat WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one connection from upgrade to disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = ConnectionId::new();
    let (sink, mut stream) = socket.split();

    let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);
    tokio::spawn(write_frames(conn_id, sink, frame_rx));

    let handle = ConnectionHandle::new(conn_id, frame_tx);
    state.registry.register(handle.clone());
    info!(conn_id = %conn_id, active = state.registry.len(), "Client connected");

    // Relays are tracked here only so finished ones can be reaped; the loop
    // never joins them.
    let mut relays = JoinSet::new();

    while let Some(incoming) = stream.next().await {
        let msg = match incoming {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket read error");
                break;
            }
        };

        let decoded = match msg {
            Message::Text(text) => ChatMessage::decode(text.as_str().as_bytes()),
            Message::Binary(data) => ChatMessage::decode(&data),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                debug!(conn_id = %conn_id, "Client sent close frame");
                break;
            }
        };

        let chat = match decoded {
            Ok(chat) => chat,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Malformed client frame, closing connection");
                break;
            }
        };

        while relays.try_join_next().is_some() {}

        debug!(conn_id = %conn_id, len = chat.text.len(), "Spawning relay");
        relays.spawn(relay_task(state.clone(), handle.clone(), chat.text));
    }

    state.registry.unregister(&conn_id);
    info!(
        conn_id = %conn_id,
        in_flight = relays.len(),
        active = state.registry.len(),
        "Client disconnected"
    );

    // In-flight relays run to completion after the client leaves; there is
    // no cancellation path.
    relays.detach_all();
}

/// One relay task: a single upstream request streamed to `conn`.
async fn relay_task(state: AppState, conn: ConnectionHandle, text: String) {
    let request = CompletionRequest::user(&*state.model, text);
    relay_message(conn.id(), &*state.driver, request, conn.frames()).await;
}

/// Drain queued frames onto the socket, one JSON text message per frame.
///
/// Exits once every [`ConnectionHandle`] clone is dropped or the socket
/// rejects a write.
async fn write_frames(
    conn_id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Failed to serialize frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket write failed");
            break;
        }
    }
    let _ = sink.close().await;
}
