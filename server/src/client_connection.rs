use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{
    error::{CallError, ok_status},
    proto,
    service::{CallStream, QueryService},
    types::{
        ProtoDeserializable,
        client_message::{ClientMessage, ClientMessagePayload},
    },
};

/// One client's calls, multiplexed over a single connection by `request_id`.
///
/// Every call runs as its own task that forwards chunks into the shared
/// `outgoing` channel and finishes with exactly one status frame.
pub struct ClientConnection {
    service: Arc<QueryService>,
    outgoing: mpsc::Sender<proto::ServerMessage>,
    calls: HashMap<u32, ActiveCall>,
}

struct ActiveCall {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ClientConnection {
    #[must_use]
    pub fn new(service: Arc<QueryService>, outgoing: mpsc::Sender<proto::ServerMessage>) -> Self {
        Self {
            service,
            outgoing,
            calls: HashMap::new(),
        }
    }

    /// Handle one decoded client frame.
    ///
    /// Returns a reply that must be sent right away, for requests rejected
    /// before any call started. Call output arrives on `outgoing`.
    pub fn handle_message(
        &mut self,
        proto_message: proto::ClientMessage,
    ) -> Option<proto::ServerMessage> {
        let request_id = proto_message.request_id;
        let message = match ClientMessage::from_proto(proto_message) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(?request_id, "rejecting client message: {err}");
                return Some(proto::ServerMessage::status(
                    request_id,
                    "",
                    CallError::Protocol(err).to_status(),
                ));
            }
        };

        self.calls.retain(|_, call| !call.task.is_finished());
        match message.payload {
            ClientMessagePayload::Query { auth, spec } => {
                if self.calls.contains_key(&message.request_id) {
                    tracing::warn!(request_id = message.request_id, "request_id already in flight");
                    // The in-flight call owns this request_id, so the
                    // rejection cannot be addressed to it.
                    let error = CallError::Protocol(format!(
                        "request_id {} is already in flight",
                        message.request_id
                    ));
                    return Some(proto::ServerMessage::status(
                        None,
                        &spec.query_id,
                        error.to_status(),
                    ));
                }
                let stream = self.service.execute(&auth, spec);
                let (cancel, cancel_rx) = oneshot::channel();
                let task = tokio::spawn(forward_call(
                    message.request_id,
                    stream,
                    cancel_rx,
                    self.outgoing.clone(),
                ));
                self.calls.insert(
                    message.request_id,
                    ActiveCall {
                        cancel: Some(cancel),
                        task,
                    },
                );
                None
            }
            ClientMessagePayload::Cancel { request_id } => {
                match self.calls.get_mut(&request_id).and_then(|call| call.cancel.take()) {
                    Some(cancel) => {
                        tracing::debug!(request_id, "cancelling call");
                        let _ = cancel.send(());
                    }
                    None => tracing::debug!(request_id, "cancel for a call that is not running"),
                }
                None
            }
        }
    }

    /// Number of calls that have not yet sent their status frame.
    #[must_use]
    pub fn active_calls(&self) -> usize {
        self.calls
            .values()
            .filter(|call| !call.task.is_finished())
            .count()
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        for call in self.calls.values() {
            call.task.abort();
        }
    }
}

/// Relay one call's stream to the connection, ending with its status frame.
async fn forward_call(
    request_id: u32,
    mut stream: CallStream,
    mut cancel: oneshot::Receiver<()>,
    outgoing: mpsc::Sender<proto::ServerMessage>,
) {
    let query_id = stream.query_id().to_owned();
    let request_id = Some(request_id);

    let status = loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                stream.cancel();
                break CallError::Cancelled.to_status();
            }
            item = stream.next() => match item {
                Some(Ok(chunk)) => {
                    let message = proto::ServerMessage::chunk(request_id, &query_id, chunk.payload);
                    if outgoing.send(message).await.is_err() {
                        return;
                    }
                }
                Some(Err(error)) => break error.to_status(),
                None => break ok_status(),
            },
        }
    };

    let _ = outgoing
        .send(proto::ServerMessage::status(request_id, &query_id, status))
        .await;
}
