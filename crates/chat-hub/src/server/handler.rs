//! WebSocket handler
//!
//! Runs one reader and one writer task per socket. The reader decodes intents
//! and feeds them to the handshake state machine in arrival order; the writer
//! drains the connection's outbound queue.

use crate::connection::{Connection, ConnectionState, Outbound};
use crate::handlers::{HandlerError, IntentDispatcher};
use crate::protocol::{ClientIntent, CloseCode, ServerEvent};
use crate::server::HubState;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long the writer may take to flush queued events and the close frame
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<HubState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: HubState, socket: WebSocket) {
    let session_id = Connection::generate_id();

    // Create message channel for outgoing messages
    let (tx, rx) = mpsc::channel::<Outbound>(state.config().outbound_buffer.max(1));
    let connection = Connection::new(session_id.clone(), tx);
    state.connection_opened();

    tracing::info!(session_id = %session_id, "WebSocket connection established");

    let (ws_sink, ws_stream) = socket.split();

    let mut send_task = tokio::spawn(write_outbound(ws_sink, rx, connection.clone()));

    let state_recv = state.clone();
    let connection_recv = connection.clone();
    let mut recv_task =
        tokio::spawn(async move { read_inbound(&state_recv, &connection_recv, ws_stream).await });

    tokio::select! {
        result = &mut recv_task => {
            let close_code = match result {
                Ok(code) => code,
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "Receive task failed");
                    Some(CloseCode::UnknownError)
                }
            };

            let previous = connection.mark_closed();
            match close_code {
                Some(code) => {
                    tracing::debug!(session_id = %session_id, close_code = %code, "Closing connection");
                    connection.close(code);
                }
                None => connection.shutdown(),
            }

            cleanup_connection(&state, &connection, previous);

            // Let the writer flush the error event and close frame.
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut send_task).await.is_err() {
                tracing::warn!(session_id = %session_id, "Writer did not finish, aborting");
                send_task.abort();
            }
        }
        _ = &mut send_task => {
            tracing::debug!(session_id = %session_id, "Send task ended");

            // Wait for the reader to stop so no intent is handled after cleanup.
            recv_task.abort();
            let _ = recv_task.await;

            let previous = connection.mark_closed();
            cleanup_connection(&state, &connection, previous);
        }
    }
}

/// Read frames until the peer goes away or the hub decides to close
///
/// Returns the close code the hub should send, if any.
async fn read_inbound(
    state: &HubState,
    connection: &Arc<Connection>,
    mut ws_stream: SplitStream<WebSocket>,
) -> Option<CloseCode> {
    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(close_code) = handle_text_message(state, connection, &text).await {
                    return Some(close_code);
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!(
                    session_id = %connection.session_id(),
                    "Binary messages not supported"
                );
                return Some(CloseCode::DecodeError);
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Transport-level ping is answered by axum
                tracing::trace!(session_id = %connection.session_id(), "Transport ping/pong");
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(
                    session_id = %connection.session_id(),
                    code = frame.as_ref().map(|f| f.code),
                    "Client closed connection"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %connection.session_id(),
                    error = %e,
                    "WebSocket error"
                );
                return None;
            }
        }

        if connection.is_closed() {
            // Superseded while handling; the writer is already closing.
            return None;
        }
    }
    None
}

/// Handle a text message from the client
async fn handle_text_message(
    state: &HubState,
    connection: &Arc<Connection>,
    text: &str,
) -> Result<(), CloseCode> {
    let result = match ClientIntent::from_json(text) {
        Ok(intent) => {
            tracing::trace!(
                session_id = %connection.session_id(),
                intent = intent.kind(),
                "Received intent"
            );
            IntentDispatcher::dispatch(state, connection, intent).await
        }
        Err(e) => Err(HandlerError::InvalidPayload(e.to_string())),
    };

    let Err(e) = result else {
        return Ok(());
    };

    tracing::warn!(
        session_id = %connection.session_id(),
        user_id = ?connection.user_id(),
        protocol_violation = e.is_protocol_violation(),
        error = %e,
        "Handler error"
    );

    if let Some(message) = e.client_message() {
        if let Err(send_err) = connection.send_event(ServerEvent::error(message)) {
            tracing::warn!(
                session_id = %connection.session_id(),
                error = %send_err,
                "Failed to queue error event"
            );
        }
    }

    match e.to_close_code() {
        Some(close_code) => Err(close_code),
        None => Ok(()),
    }
}

/// Drain the outbound queue into the socket
async fn write_outbound(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    connection: Arc<Connection>,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = connection.close_requested() => None,
            item = rx.recv() => item,
        };

        match next {
            Some(Outbound::Event(event)) => {
                let json = match event.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(
                            session_id = %connection.session_id(),
                            event = event.kind(),
                            error = %e,
                            "Failed to serialize event"
                        );
                        continue;
                    }
                };

                if ws_sink.send(Message::Text(json)).await.is_err() {
                    tracing::warn!(
                        session_id = %connection.session_id(),
                        "Failed to send message to WebSocket"
                    );
                    return;
                }
            }
            Some(Outbound::Close(code)) => {
                send_close(&mut ws_sink, Some(code)).await;
                return;
            }
            None => {
                send_close(&mut ws_sink, connection.close_code()).await;
                return;
            }
        }
    }
}

async fn send_close(ws_sink: &mut SplitSink<WebSocket, Message>, code: Option<CloseCode>) {
    if let Some(code) = code {
        let frame = CloseFrame {
            code: code.as_u16(),
            reason: Cow::Borrowed(code.description()),
        };
        let _ = ws_sink.send(Message::Close(Some(frame))).await;
    }
    let _ = ws_sink.close().await;
}

/// Clean up a connection on disconnect
fn cleanup_connection(state: &HubState, connection: &Arc<Connection>, previous: ConnectionState) {
    if let ConnectionState::Authenticated(user_id) = previous {
        state.presence().leave(user_id, connection);
    }

    state.connection_closed();

    tracing::info!(
        session_id = %connection.session_id(),
        connected_ms = saturating_millis(connection.age()),
        "Connection closed"
    );
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
