//! Authentication and quota admission.
//!
//! A call is admitted only after its `AuthContext` names a configured user
//! with a valid credential and its quota class has a free call slot.
//!
//! # Post-conditions
//! - A successful admission yields a [`QuotaPermit`] that must live as long
//!   as the call's producer.
//!
//! # Invariants
//! - User and quota tables are immutable once the service is built.

pub mod jwt;
pub mod quota;
pub mod users;

pub use quota::{QuotaPermit, QuotaRegistry};
pub use users::UserDirectory;

/// Error returned when a call cannot be admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The user is not configured.
    UnknownUser(String),
    /// The credential does not match the user.
    BadCredential { user: String, reason: String },
    /// The quota class is not configured.
    UnknownQuota(String),
    /// Every call slot of the quota class is taken.
    QuotaExhausted(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownUser(user) => write!(f, "unknown user '{user}'"),
            Self::BadCredential { user, reason } => {
                write!(f, "bad credential for user '{user}': {reason}")
            }
            Self::UnknownQuota(class) => write!(f, "unknown quota class '{class}'"),
            Self::QuotaExhausted(class) => {
                write!(f, "quota class '{class}' has no free call slots")
            }
        }
    }
}

impl std::error::Error for AuthError {}
