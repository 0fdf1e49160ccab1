use std::time::Duration;

use crate::format::Format;
use crate::proto;
use crate::types::ProtoDeserializable;

/// One query to run, with its output and pacing parameters.
///
/// # Invariants
/// - `query_id` is never empty.
/// - `max_execution_time`, when set, is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub text: String,
    pub query_id: String,
    /// Requested output format. A `FORMAT` clause in `text` takes precedence.
    pub format: Format,
    /// Minimum time between flushes. Zero flushes every block.
    pub interactive_delay: Duration,
    pub max_execution_time: Option<Duration>,
}

impl QuerySpec {
    /// A spec with a fresh query id, the default format and no pacing.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            query_id: generate_query_id(),
            format: Format::TabSeparated,
            interactive_delay: Duration::ZERO,
            max_execution_time: None,
        }
    }

    /// True when the text holds no statement: only whitespace and `;`.
    #[must_use]
    pub fn is_empty_query(&self) -> bool {
        self.text.trim().trim_end_matches(';').trim().is_empty()
    }
}

/// A fresh random (v4) UUID in its hyphenated text form.
#[must_use]
pub fn generate_query_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ProtoDeserializable<proto::QuerySpec> for QuerySpec {
    fn from_proto(spec: proto::QuerySpec) -> Result<Self, String> {
        let format = Format::parse(&spec.format)?;
        let query_id = if spec.query_id.is_empty() {
            generate_query_id()
        } else {
            spec.query_id
        };
        let max_execution_time = match spec.max_execution_time {
            None => None,
            Some(limit) => {
                let limit = Duration::try_from(limit)
                    .map_err(|e| format!("invalid max_execution_time: {e}"))?;
                (!limit.is_zero()).then_some(limit)
            }
        };
        Ok(Self {
            text: spec.query,
            query_id,
            format,
            interactive_delay: Duration::from_millis(spec.interactive_delay_ms),
            max_execution_time,
        })
    }
}

impl From<&QuerySpec> for proto::QuerySpec {
    fn from(spec: &QuerySpec) -> Self {
        Self {
            query: spec.text.clone(),
            query_id: spec.query_id.clone(),
            format: spec.format.name().to_owned(),
            interactive_delay_ms: u64::try_from(spec.interactive_delay.as_millis())
                .unwrap_or(u64::MAX),
            max_execution_time: spec
                .max_execution_time
                .and_then(|limit| prost_types::Duration::try_from(limit).ok()),
        }
    }
}
