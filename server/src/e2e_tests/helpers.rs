//! Common helpers for end-to-end tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::client_connection::ClientConnection;
use crate::config::ServerConfig;
use crate::error::ok_status;
use crate::proto::{self, google::rpc::Code};
use crate::service::QueryService;
use crate::testing;
use crate::types::{AuthContext, QuerySpec};

/// How long a test waits for the next frame before failing.
const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// What one call produced, at either the service or the connection level.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub query_id: String,
    pub chunks: Vec<String>,
    pub status: proto::google::rpc::Status,
}

impl CallResult {
    pub fn payload(&self) -> String {
        self.chunks.concat()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.payload()
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    }

    pub fn code(&self) -> Code {
        Code::try_from(self.status.code).unwrap_or(Code::Unknown)
    }

    #[track_caller]
    pub fn assert_ok(&self) -> &Self {
        assert_eq!(self.code(), Code::Ok, "call failed: {}", self.status.message);
        self
    }
}

/// A service plus one connection to it, driven from synchronous tests.
pub struct TestClient {
    pub service: Arc<QueryService>,
    connection: ClientConnection,
    frames: mpsc::Receiver<proto::ServerMessage>,
    /// Frames read while waiting for a different call.
    buffered: HashMap<Option<u32>, Vec<proto::ServerMessage>>,
    next_request_id: u32,
    pub runtime: tokio::runtime::Runtime,
}

impl TestClient {
    /// Create a new test client over a fresh in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ServerConfig::default())
    }

    #[must_use]
    pub fn with_config(config: &ServerConfig) -> Self {
        let service = testing::service_with(config);
        let (outgoing, frames) = mpsc::channel(config.connection_channel_capacity);
        let connection = ClientConnection::new(Arc::clone(&service), outgoing);

        #[allow(clippy::expect_used)]
        let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

        Self {
            service,
            connection,
            frames,
            buffered: HashMap::new(),
            next_request_id: 1,
            runtime,
        }
    }

    /// Allocate a request id not yet used on this connection.
    pub fn request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Hand a frame to the connection and return its immediate reply, if any.
    pub fn send(&mut self, message: proto::ClientMessage) -> Option<proto::ServerMessage> {
        let _guard = self.runtime.enter();
        self.connection.handle_message(message)
    }

    /// Start a query on the connection and return its request id.
    pub fn start(&mut self, query: &str) -> u32 {
        let request_id = self.request_id();
        let reply = self.send(testing::query_message(request_id, query));
        assert!(reply.is_none(), "query was rejected: {reply:?}");
        request_id
    }

    /// Run a query over the connection and wait for its status frame.
    pub fn query(&mut self, query: &str) -> CallResult {
        let request_id = self.start(query);
        self.collect(request_id)
    }

    /// Run a query and return its whitespace-split output, asserting success.
    #[track_caller]
    pub fn tokens(&mut self, query: &str) -> Vec<String> {
        let result = self.query(query);
        result.assert_ok();
        result.tokens()
    }

    /// The next frame for `request_id`, reading ahead as needed.
    pub fn next_frame_for(&mut self, request_id: u32) -> proto::ServerMessage {
        let key = Some(request_id);
        loop {
            if let Some(frames) = self.buffered.get_mut(&key) {
                if !frames.is_empty() {
                    return frames.remove(0);
                }
            }
            let frame = self.next_frame();
            self.buffered.entry(frame.request_id).or_default().push(frame);
        }
    }

    /// The next frame from any call.
    pub fn next_frame(&mut self) -> proto::ServerMessage {
        let frames = &mut self.frames;
        let frame = self
            .runtime
            .block_on(async { tokio::time::timeout(FRAME_TIMEOUT, frames.recv()).await });
        match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => panic!("connection channel closed"),
            Err(_) => panic!("timed out waiting for a frame"),
        }
    }

    /// Read frames for `request_id` up to and including its status.
    pub fn collect(&mut self, request_id: u32) -> CallResult {
        let mut chunks = Vec::new();
        loop {
            let frame = self.next_frame_for(request_id);
            match frame.payload {
                Some(proto::server_message::Payload::Chunk(chunk)) => chunks.push(chunk.payload),
                Some(proto::server_message::Payload::Status(status)) => {
                    return CallResult {
                        query_id: frame.query_id,
                        chunks,
                        status,
                    };
                }
                None => panic!("frame without payload"),
            }
        }
    }

    /// Whether any frame for `request_id` is waiting, without blocking.
    pub fn has_pending_frame(&mut self, request_id: u32) -> bool {
        while let Ok(frame) = self.frames.try_recv() {
            self.buffered.entry(frame.request_id).or_default().push(frame);
        }
        self.buffered
            .get(&Some(request_id))
            .is_some_and(|frames| !frames.is_empty())
    }

    /// Run a call directly against the service, bypassing the connection.
    pub fn execute(&self, auth: &AuthContext, spec: QuerySpec) -> CallResult {
        self.runtime.block_on(async {
            let mut stream = self.service.execute(auth, spec);
            let query_id = stream.query_id().to_owned();
            let mut chunks = Vec::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => chunks.push(chunk.payload),
                    Err(error) => {
                        return CallResult {
                            query_id,
                            chunks,
                            status: error.to_status(),
                        };
                    }
                }
            }
            CallResult {
                query_id,
                chunks,
                status: ok_status(),
            }
        })
    }

    /// Wait until every call on the connection has finished its task.
    pub fn wait_idle(&self) {
        for _ in 0..200 {
            if self.connection.active_calls() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("calls still running on the connection");
    }

    /// Wait until every slot of `class` is free again.
    pub fn wait_for_quota(&self, class: &str, expected: usize) {
        self.runtime.block_on(async {
            for _ in 0..200 {
                if self.service.quotas().available(class) == Some(expected) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("quota class {class} never returned to {expected} free slots");
        });
    }
}

/// The `default` user with an empty credential.
pub fn default_auth() -> AuthContext {
    AuthContext::new("default", "")
}

/// The lines `0\n1\n...` that `numbers(n)` formats to.
pub fn number_lines(n: u64) -> String {
    (0..n).map(|i| format!("{i}\n")).collect()
}

/// A proto query frame with full control over every field.
pub fn query_request(
    request_id: u32,
    auth: proto::AuthContext,
    spec: proto::QuerySpec,
) -> proto::ClientMessage {
    proto::ClientMessage {
        request_id: Some(request_id),
        payload: Some(proto::client_message::Payload::Query(proto::QueryRequest {
            auth: Some(auth),
            query: Some(spec),
        })),
    }
}

pub fn status_code(message: &proto::ServerMessage) -> Option<Code> {
    match &message.payload {
        Some(proto::server_message::Payload::Status(status)) => Code::try_from(status.code).ok(),
        _ => None,
    }
}
