//! The query streaming service.
//!
//! `QueryService::execute` admits a call (user, credential, quota), then runs
//! it on a blocking worker that drains the engine cursor block by block and
//! pushes chunks into a bounded channel. The returned [`CallStream`] is the
//! receiving end.
//!
//! # Pre-conditions
//! - `execute` is called from within a Tokio runtime.
//!
//! # Post-conditions
//! - Every stream yields zero or more chunks followed by at most one error;
//!   ending without an error means the call succeeded.
//!
//! # Invariants
//! - A full channel blocks the producer; nothing is buffered without bound.
//! - Dropping or cancelling a stream stops its producer within one block.
//! - The quota slot and the engine cursor live exactly as long as the producer.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use futures::Stream;
use tokio::sync::mpsc;

use crate::auth::{QuotaPermit, QuotaRegistry, UserDirectory};
use crate::call::{CallState, ChunkAssembler};
use crate::config::ServerConfig;
use crate::engine::{EngineError, Execution, QueryEngine};
use crate::error::CallError;
use crate::format::Format;
use crate::proto;
use crate::types::{AuthContext, QuerySpec};

/// What a producer hands to its stream.
#[derive(Debug)]
enum CallEvent {
    Chunk(String),
    Finished(Result<(), CallError>),
}

pub struct QueryService {
    engine: Arc<dyn QueryEngine>,
    users: UserDirectory,
    quotas: QuotaRegistry,
    max_chunk_bytes: usize,
    call_channel_capacity: usize,
}

impl QueryService {
    #[must_use]
    pub fn new(config: &ServerConfig, engine: Arc<dyn QueryEngine>) -> Self {
        Self {
            engine,
            users: UserDirectory::new(config.users.clone(), config.jwt_secret.clone()),
            quotas: QuotaRegistry::new(&config.quotas),
            max_chunk_bytes: config.max_chunk_bytes.max(1),
            call_channel_capacity: config.call_channel_capacity.max(1),
        }
    }

    #[must_use]
    pub const fn quotas(&self) -> &QuotaRegistry {
        &self.quotas
    }

    /// Start one call.
    ///
    /// Admission failures come back as a stream holding only the error, so
    /// callers handle every outcome the same way.
    #[must_use]
    pub fn execute(&self, auth: &AuthContext, spec: QuerySpec) -> CallStream {
        let query_id = spec.query_id.clone();
        let permit = match self.admit(auth) {
            Ok(permit) => permit,
            Err(error) => {
                tracing::warn!(query_id = %query_id, user = %auth.user, "call rejected: {error}");
                return CallStream::failed(query_id, error);
            }
        };

        let (sender, receiver) = mpsc::channel(self.call_channel_capacity);
        let cancel = Arc::new(AtomicBool::new(false));
        let producer = Producer {
            engine: Arc::clone(&self.engine),
            user: auth.user.clone(),
            spec,
            max_chunk_bytes: self.max_chunk_bytes,
            sender,
            cancel: Arc::clone(&cancel),
            _permit: permit,
        };

        let span = tracing::info_span!("call", query_id = %query_id, user = %auth.user);
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            producer.run();
        });

        CallStream {
            query_id,
            receiver,
            cancel,
            done: false,
        }
    }

    fn admit(&self, auth: &AuthContext) -> Result<QuotaPermit, CallError> {
        self.users.authenticate(&auth.user, &auth.credential)?;
        Ok(self.quotas.acquire(&auth.quota)?)
    }
}

/// The worker side of one call.
struct Producer {
    engine: Arc<dyn QueryEngine>,
    user: String,
    spec: QuerySpec,
    max_chunk_bytes: usize,
    sender: mpsc::Sender<CallEvent>,
    cancel: Arc<AtomicBool>,
    _permit: QuotaPermit,
}

impl Producer {
    fn run(self) {
        let started = Instant::now();
        tracing::info!("call started");
        tracing::debug!("query text: {}", self.spec.text);

        let mut state = CallState::Open;
        let outcome = self.stream(&mut state, started);
        let terminal = if outcome.is_ok() {
            CallState::ClosedOk
        } else {
            CallState::ClosedError
        };
        if let Err(error) = state.advance(terminal) {
            tracing::error!("{error}");
        }

        match &outcome {
            Ok(()) => tracing::info!(elapsed = ?started.elapsed(), "call finished"),
            Err(CallError::Cancelled) => tracing::info!("call cancelled"),
            Err(error) => tracing::info!("call failed: {error}"),
        }
        if self.sender.blocking_send(CallEvent::Finished(outcome)).is_err() {
            tracing::debug!("call stream dropped before the terminal status");
        }
    }

    fn stream(&self, state: &mut CallState, started: Instant) -> Result<(), CallError> {
        if self.spec.is_empty_query() {
            return Ok(());
        }
        self.check_interrupted(started)?;

        let Execution::Rows { mut cursor, format } =
            self.engine.execute(&self.user, &self.spec.text)?
        else {
            return Ok(());
        };
        let format = match format {
            Some(name) => Format::parse(&name).map_err(EngineError::Syntax)?,
            None => self.spec.format,
        };

        let mut assembler = ChunkAssembler::new(
            format,
            self.spec.interactive_delay,
            self.max_chunk_bytes,
            Instant::now(),
        );
        assembler.push_header(cursor.columns());

        loop {
            self.check_interrupted(started)?;
            let Some(block) = cursor.next_block()? else {
                break;
            };
            assembler.push_block(&block);
            while let Some(chunk) = assembler.take_due(Instant::now()) {
                self.send_chunk(chunk, state)?;
            }
        }
        for chunk in assembler.finish() {
            self.send_chunk(chunk, state)?;
        }
        Ok(())
    }

    fn check_interrupted(&self, started: Instant) -> Result<(), CallError> {
        if self.cancel.load(Ordering::Acquire) {
            return Err(CallError::Cancelled);
        }
        match self.spec.max_execution_time {
            Some(limit) if started.elapsed() > limit => Err(CallError::DeadlineExceeded(limit)),
            _ => Ok(()),
        }
    }

    fn send_chunk(&self, payload: String, state: &mut CallState) -> Result<(), CallError> {
        state.advance(CallState::Streaming).map_err(CallError::Internal)?;
        tracing::debug!(bytes = payload.len(), "chunk");
        self.sender
            .blocking_send(CallEvent::Chunk(payload))
            .map_err(|_| CallError::Cancelled)
    }
}

/// Receiving end of one call.
///
/// Yields `Ok(chunk)` items in emission order. A failed call yields one
/// final `Err`; a successful call simply ends.
#[derive(Debug)]
pub struct CallStream {
    query_id: String,
    receiver: mpsc::Receiver<CallEvent>,
    cancel: Arc<AtomicBool>,
    done: bool,
}

impl CallStream {
    fn failed(query_id: String, error: CallError) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        // A fresh channel with capacity 1 always has room.
        let _ = sender.try_send(CallEvent::Finished(Err(error)));
        Self {
            query_id,
            receiver,
            cancel: Arc::new(AtomicBool::new(false)),
            done: false,
        }
    }

    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Ask the producer to stop at its next block boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }
}

impl Stream for CallStream {
    type Item = Result<proto::ResultChunk, CallError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(CallEvent::Chunk(payload))) => {
                Poll::Ready(Some(Ok(proto::ResultChunk { payload })))
            }
            Poll::Ready(Some(CallEvent::Finished(Ok(())))) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(CallEvent::Finished(Err(error)))) => {
                this.done = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(Some(Err(CallError::Internal(
                    "call worker exited without a status".to_owned(),
                ))))
            }
        }
    }
}

impl Drop for CallStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
