//! Query engine seam.
//!
//! The streaming service never interprets query text itself. It hands the
//! text to a [`QueryEngine`] and gets back either a finished statement
//! (DDL/DML) or a [`RowCursor`] it drains block by block.
//!
//! [`MemoryEngine`] is the embedded implementation: an in-memory catalog
//! that understands a small statement subset, enough to run the service
//! end to end without an external database.
//!
//! # Invariants
//!
//! - A cursor yields blocks in row order; the service never reorders them.
//! - Dropping a cursor releases everything it holds (snapshots, counters).
//! - `next_block` returns after scanning at most one block's worth of input,
//!   so callers regain control regularly even when a filter rejects every row.

mod error;
mod memory;
mod statement;
mod value;

pub use error::EngineError;
pub use memory::MemoryEngine;
pub use value::{DataType, Row, Value};

/// A named, typed output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Row-producing handle returned for SELECT-class statements.
pub trait RowCursor: Send {
    /// Output columns, fixed for the cursor's lifetime.
    fn columns(&self) -> &[Column];

    /// Produce the next block of rows.
    ///
    /// `Ok(None)` means the cursor is exhausted. An empty block is valid and
    /// only signals that the cursor made progress without output.
    fn next_block(&mut self) -> Result<Option<Vec<Row>>, EngineError>;
}

/// Outcome of handing one statement to an engine.
pub enum Execution {
    /// The statement ran to completion and produces no rows.
    Done,
    /// The statement produces rows.
    Rows {
        cursor: Box<dyn RowCursor>,
        /// Output format named inside the statement (`... FORMAT CSV`).
        format: Option<String>,
    },
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Rows { cursor, format } => f
                .debug_struct("Rows")
                .field("columns", &cursor.columns())
                .field("format", format)
                .finish(),
        }
    }
}

/// The execution backend the streaming service fronts.
///
/// Implementations must be usable from many calls at once; each call owns
/// its cursor exclusively.
pub trait QueryEngine: Send + Sync {
    /// Run one statement on behalf of `user`.
    fn execute(&self, user: &str, query: &str) -> Result<Execution, EngineError>;
}
