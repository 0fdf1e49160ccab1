//! Async client for the streaming endpoint.
//!
//! One [`QueryClient`] owns one WebSocket and runs calls one at a time; the
//! lower-level [`QueryClient::start`] / [`QueryClient::recv`] pair is there
//! for callers that want to interleave cancels.

use futures::{SinkExt, StreamExt};
use prost::Message as ProstMessage;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message},
};

use crate::proto::{self, google::rpc::Code};
use crate::types::{AuthContext, QuerySpec};

/// Error returned by [`QueryClient`].
#[derive(Debug)]
pub enum ClientError {
    /// The WebSocket failed.
    Transport(tungstenite::Error),
    /// The server sent a frame that is not a `ServerMessage`.
    Decode(prost::DecodeError),
    /// The server closed the connection before the call's status arrived.
    ConnectionClosed,
    /// The call ended with a non-OK status.
    Status { code: i32, message: String },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Decode(e) => write!(f, "failed to decode server message: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed before the call finished"),
            Self::Status { code, message } => {
                match Code::try_from(*code) {
                    Ok(code) => write!(f, "call failed with {code:?}: {message}"),
                    Err(_) => write!(f, "call failed with code {code}: {message}"),
                }
            }
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::ConnectionClosed | Self::Status { .. } => None,
        }
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error)
    }
}

impl From<prost::DecodeError> for ClientError {
    fn from(error: prost::DecodeError) -> Self {
        Self::Decode(error)
    }
}

/// Everything one call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub query_id: String,
    pub chunks: Vec<String>,
    pub status: proto::google::rpc::Status,
}

impl CallOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.code == i32::from(Code::Ok)
    }

    #[must_use]
    pub fn code(&self) -> Code {
        Code::try_from(self.status.code).unwrap_or(Code::Unknown)
    }

    /// The concatenated payload.
    #[must_use]
    pub fn payload(&self) -> String {
        self.chunks.concat()
    }

    /// The concatenated payload split on whitespace.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.payload()
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    }

    /// `Ok(self)` for an OK status, the status as an error otherwise.
    pub fn into_result(self) -> Result<Self, ClientError> {
        if self.is_ok() {
            return Ok(self);
        }
        Err(ClientError::Status {
            code: self.status.code,
            message: self.status.message,
        })
    }
}

pub struct QueryClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_request_id: u32,
}

impl QueryClient {
    /// Connect to a server, e.g. `ws://127.0.0.1:9001/query`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(url).await?;
        Ok(Self {
            socket,
            next_request_id: 1,
        })
    }

    /// Run one call to completion.
    pub async fn execute(
        &mut self,
        auth: &AuthContext,
        spec: &QuerySpec,
    ) -> Result<CallOutcome, ClientError> {
        self.execute_with(auth, spec, |_| {}).await
    }

    /// Run one call, handing each chunk to `on_chunk` as it arrives.
    pub async fn execute_with<F>(
        &mut self,
        auth: &AuthContext,
        spec: &QuerySpec,
        mut on_chunk: F,
    ) -> Result<CallOutcome, ClientError>
    where
        F: FnMut(&str),
    {
        let request_id = self.start(auth, spec).await?;
        let mut chunks = Vec::new();
        loop {
            let message = self.recv().await?;
            if message.request_id != Some(request_id) {
                tracing::debug!(request_id = ?message.request_id, "skipping frame for another call");
                continue;
            }
            match message.payload {
                Some(proto::server_message::Payload::Chunk(chunk)) => {
                    on_chunk(&chunk.payload);
                    chunks.push(chunk.payload);
                }
                Some(proto::server_message::Payload::Status(status)) => {
                    return Ok(CallOutcome {
                        query_id: message.query_id,
                        chunks,
                        status,
                    });
                }
                None => tracing::warn!("server frame without payload"),
            }
        }
    }

    /// Run `spec` and return its output split on whitespace.
    pub async fn tokens(
        &mut self,
        auth: &AuthContext,
        spec: &QuerySpec,
    ) -> Result<Vec<String>, ClientError> {
        Ok(self.execute(auth, spec).await?.into_result()?.tokens())
    }

    /// Send a query frame and return its request id without waiting.
    pub async fn start(&mut self, auth: &AuthContext, spec: &QuerySpec) -> Result<u32, ClientError> {
        let request_id = self.allocate_request_id();
        let message = proto::ClientMessage {
            request_id: Some(request_id),
            payload: Some(proto::client_message::Payload::Query(proto::QueryRequest {
                auth: Some(auth.into()),
                query: Some(spec.into()),
            })),
        };
        self.send(&message).await?;
        Ok(request_id)
    }

    /// Ask the server to cancel an in-flight call.
    pub async fn cancel(&mut self, target: u32) -> Result<(), ClientError> {
        let request_id = self.allocate_request_id();
        let message = proto::ClientMessage {
            request_id: Some(request_id),
            payload: Some(proto::client_message::Payload::Cancel(
                proto::CancelRequest { request_id: target },
            )),
        };
        self.send(&message).await
    }

    /// The next server frame, whichever call it belongs to.
    pub async fn recv(&mut self) -> Result<proto::ServerMessage, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Binary(data) => return Ok(proto::ServerMessage::decode(data.as_slice())?),
                Message::Close(_) => return Err(ClientError::ConnectionClosed),
                _ => {}
            }
        }
        Err(ClientError::ConnectionClosed)
    }

    /// Close the connection; the server aborts any calls still running.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, message: &proto::ClientMessage) -> Result<(), ClientError> {
        self.socket
            .send(Message::Binary(message.encode_to_vec()))
            .await?;
        Ok(())
    }

    fn allocate_request_id(&mut self) -> u32 {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        request_id
    }
}
