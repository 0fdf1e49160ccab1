//! WebSocket transport.
//!
//! Clients connect to `/query` and exchange binary prost frames. Each socket
//! gets its own [`ClientConnection`]; every frame its calls produce goes
//! through one bounded channel, which is drained into the socket here.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::any,
};
use prost::Message as ProstMessage;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::{ClientConnection, error::CallError, proto, service::QueryService};

#[derive(Clone)]
struct AppState {
    service: Arc<QueryService>,
    /// Frames buffered per connection before calls stop producing.
    connection_channel_capacity: usize,
}

/// The HTTP router with the streaming endpoint mounted at `/query`.
#[must_use]
pub fn router(service: Arc<QueryService>, connection_channel_capacity: usize) -> Router {
    let state = AppState {
        service,
        connection_channel_capacity: connection_channel_capacity.max(1),
    };
    Router::new()
        .route("/query", any(ws_handler))
        .with_state(state)
}

/// Serve the streaming endpoint on `listener` until the server fails.
pub async fn serve(
    listener: TcpListener,
    service: Arc<QueryService>,
    connection_channel_capacity: usize,
) -> std::io::Result<()> {
    axum::serve(listener, router(service, connection_channel_capacity)).await
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("got a websocket connection");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (outgoing, mut outgoing_rx) = mpsc::channel(state.connection_channel_capacity);
    let mut connection = ClientConnection::new(state.service, outgoing);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::warn!("websocket receive error: {e}");
                        return;
                    }
                    None => {
                        tracing::debug!("client disconnected");
                        return;
                    }
                };

                let data = match msg {
                    Message::Binary(data) => data,
                    Message::Text(_) => {
                        tracing::debug!("ignoring text frame");
                        continue;
                    }
                    Message::Ping(data) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                        continue;
                    }
                    Message::Pong(_) => continue,
                    Message::Close(_) => {
                        tracing::debug!("client sent close");
                        return;
                    }
                };

                let reply = match proto::ClientMessage::decode(data.as_ref()) {
                    Ok(client_message) => {
                        tracing::debug!(request_id = ?client_message.request_id, "received client message");
                        connection.handle_message(client_message)
                    }
                    Err(e) => {
                        tracing::warn!("failed to decode ClientMessage: {e}");
                        let error = CallError::Protocol(format!("failed to decode message: {e}"));
                        Some(proto::ServerMessage::status(None, "", error.to_status()))
                    }
                };

                // Replies bypass the channel: they belong to no running call,
                // and this loop is the channel's only reader.
                if let Some(reply) = reply {
                    if socket.send(Message::Binary(reply.encode_to_vec().into())).await.is_err() {
                        tracing::debug!("client disconnected");
                        return;
                    }
                }
            }

            Some(frame) = outgoing_rx.recv() => {
                if socket.send(Message::Binary(frame.encode_to_vec().into())).await.is_err() {
                    tracing::debug!("client disconnected during a call");
                    return;
                }
            }
        }
    }
}
