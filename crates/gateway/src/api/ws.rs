//! WebSocket endpoint for run spectators.
//!
//! Flow:
//! 1. Client connects to `/live/{run_id}`.
//! 2. The connection is registered as the run's (possibly first) subscriber,
//!    which may unblock an orchestrator waiting in `EventBus::await_ready`.
//! 3. Every [`RunEvent`] emitted for this run is forwarded as a JSON text
//!    frame until the run completes or the client disconnects.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::state::AppState;

/// GET /live/{run_id} — upgrade to WebSocket.
pub async fn live(ws: WebSocketUpgrade, State(state): State<AppState>, Path(run_id): Path<Uuid>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, run_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, run_id: Uuid) {
    let Some(mut rx) = state.events.subscribe(run_id) else {
        tracing::warn!(run_id = %run_id, "subscribe requested for unknown run");
        return;
    };

    let (mut sink, mut stream) = socket.split();

    // Reader: the client has nothing useful to say, but draining the socket
    // is how we notice it went away.
    let mut reader = tokio::spawn(async move { while stream.next().await.is_some() {} });

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else { continue };
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(run_id = %run_id, skipped, "live subscriber lagged, dropping events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = &mut reader => break,
        }
    }

    reader.abort();
}
