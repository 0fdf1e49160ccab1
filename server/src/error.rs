//! Call-level errors and their `google.rpc.Status` mapping.

use std::time::Duration;

use crate::auth::AuthError;
use crate::engine::EngineError;
use crate::proto::google::rpc::{Code, Status};

/// Why a call ended in `ClosedError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The request was malformed: missing fields, unknown format, bad frame.
    Protocol(String),
    /// Unknown user or rejected credential.
    Unauthenticated(String),
    /// The principal may not use the requested quota class.
    PermissionDenied(String),
    /// The quota class has no free call slot.
    ResourceExhausted(String),
    /// The engine rejected or failed the statement.
    Query(EngineError),
    /// The call ran longer than its `max_execution_time`.
    DeadlineExceeded(Duration),
    /// The caller cancelled the call explicitly.
    Cancelled,
    /// The service itself failed.
    Internal(String),
}

impl CallError {
    #[must_use]
    pub const fn code(&self) -> Code {
        match self {
            Self::Protocol(_) => Code::InvalidArgument,
            Self::Unauthenticated(_) => Code::Unauthenticated,
            Self::PermissionDenied(_) => Code::PermissionDenied,
            Self::ResourceExhausted(_) => Code::ResourceExhausted,
            Self::Query(error) => match error {
                EngineError::Syntax(_)
                | EngineError::UnknownType(_)
                | EngineError::InvalidValue(_)
                | EngineError::Unsupported(_) => Code::InvalidArgument,
                EngineError::UnknownTable(_) | EngineError::UnknownColumn(_) => Code::NotFound,
                EngineError::TableExists(_) => Code::AlreadyExists,
                EngineError::Internal(_) => Code::Internal,
            },
            Self::DeadlineExceeded(_) => Code::DeadlineExceeded,
            Self::Cancelled => Code::Cancelled,
            Self::Internal(_) => Code::Internal,
        }
    }

    /// The terminal status frame for this error.
    #[must_use]
    pub fn to_status(&self) -> Status {
        Status {
            code: self.code().into(),
            message: self.to_string(),
            ..Default::default()
        }
    }
}

/// The terminal status of a call that completed normally.
#[must_use]
pub fn ok_status() -> Status {
    Status {
        code: Code::Ok.into(),
        ..Default::default()
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Protocol(message) => write!(f, "protocol error: {message}"),
            Self::Unauthenticated(message) => write!(f, "authentication failed: {message}"),
            Self::PermissionDenied(message) => write!(f, "permission denied: {message}"),
            Self::ResourceExhausted(message) => write!(f, "quota exhausted: {message}"),
            Self::Query(error) => write!(f, "query error: {error}"),
            Self::DeadlineExceeded(limit) => {
                write!(f, "deadline exceeded: query ran longer than {limit:?}")
            }
            Self::Cancelled => write!(f, "query cancelled"),
            Self::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Query(error) => Some(error),
            _ => None,
        }
    }
}

impl From<EngineError> for CallError {
    fn from(error: EngineError) -> Self {
        Self::Query(error)
    }
}

impl From<AuthError> for CallError {
    fn from(error: AuthError) -> Self {
        let message = error.to_string();
        match error {
            AuthError::UnknownUser(_) | AuthError::BadCredential { .. } => {
                Self::Unauthenticated(message)
            }
            AuthError::UnknownQuota(_) => Self::PermissionDenied(message),
            AuthError::QuotaExhausted(_) => Self::ResourceExhausted(message),
        }
    }
}
