//! Validated request types.
//!
//! Wire messages are converted into these before anything acts on them, so
//! the rest of the server never handles optional or unchecked fields.

pub mod auth_context;
pub mod client_message;
pub mod query_spec;

pub use auth_context::AuthContext;
pub use client_message::{ClientMessage, ClientMessagePayload};
pub use query_spec::QuerySpec;

pub trait ProtoDeserializable<T> {
    fn from_proto(proto_obj: T) -> Result<Self, String>
    where
        Self: Sized;
}
