//! Per-call state and chunk assembly.
//!
//! A call moves `Open -> Streaming* -> ClosedOk | ClosedError`, and may also
//! fail straight from `Open`. The producer formats engine blocks into a
//! [`ChunkAssembler`], which decides when buffered output becomes a chunk.
//!
//! # Invariants
//! - No transition leaves a terminal state.
//! - Chunks are never empty, and their concatenation is exactly the
//!   formatted output in row order.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::engine::{Column, Row};
use crate::format::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Admitted; no chunk sent yet.
    Open,
    /// At least one chunk sent.
    Streaming,
    ClosedOk,
    ClosedError,
}

impl CallState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedOk | Self::ClosedError)
    }

    /// Move to `next`, or report the illegal transition.
    pub fn advance(&mut self, next: Self) -> Result<(), String> {
        let legal = matches!(
            (*self, next),
            (Self::Open | Self::Streaming, Self::Streaming | Self::ClosedOk | Self::ClosedError)
        );
        if !legal {
            return Err(format!("illegal call transition {self:?} -> {next:?}"));
        }
        *self = next;
        Ok(())
    }
}

/// Buffers formatted rows and cuts them into chunks.
///
/// Output is flushed when the interactive delay has elapsed since the last
/// flush, immediately when the delay is zero, and whenever the buffer
/// reaches `max_chunk_bytes` (cut at a row boundary).
#[derive(Debug)]
pub struct ChunkAssembler {
    format: Format,
    buffer: String,
    /// Chunks cut for size, waiting to be sent.
    ready: VecDeque<String>,
    interactive_delay: Duration,
    max_chunk_bytes: usize,
    last_flush: Instant,
}

impl ChunkAssembler {
    #[must_use]
    pub const fn new(
        format: Format,
        interactive_delay: Duration,
        max_chunk_bytes: usize,
        now: Instant,
    ) -> Self {
        Self {
            format,
            buffer: String::new(),
            ready: VecDeque::new(),
            interactive_delay,
            max_chunk_bytes,
            last_flush: now,
        }
    }

    pub fn push_header(&mut self, columns: &[Column]) {
        self.format.write_header(columns, &mut self.buffer);
        self.cut_if_full();
    }

    pub fn push_block(&mut self, rows: &[Row]) {
        for row in rows {
            self.format.write_row(row, &mut self.buffer);
            self.cut_if_full();
        }
    }

    fn cut_if_full(&mut self) {
        if self.buffer.len() >= self.max_chunk_bytes {
            self.ready.push_back(std::mem::take(&mut self.buffer));
        }
    }

    /// The next chunk that should be sent at `now`, if any.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        if let Some(chunk) = self.ready.pop_front() {
            self.last_flush = now;
            return Some(chunk);
        }
        if self.buffer.is_empty() {
            return None;
        }
        if now.saturating_duration_since(self.last_flush) < self.interactive_delay {
            return None;
        }
        self.last_flush = now;
        Some(std::mem::take(&mut self.buffer))
    }

    /// Everything still buffered, in order, once the cursor is exhausted.
    #[must_use]
    pub fn finish(mut self) -> Vec<String> {
        let mut chunks: Vec<String> = self.ready.drain(..).collect();
        if !self.buffer.is_empty() {
            chunks.push(self.buffer);
        }
        chunks
    }
}
