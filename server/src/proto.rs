//! Wire protocol.
//!
//! Every WebSocket binary frame carries exactly one message: clients send
//! `ClientMessage`, the server answers with `ServerMessage`. Messages are
//! declared with the prost derives directly, so no `protoc` step is needed.
//! Field tags are part of the protocol and must never be reused.
//!
//! ```text
//! message ClientMessage {
//!   optional uint32 request_id = 1;
//!   oneof payload { QueryRequest query = 2; CancelRequest cancel = 3; }
//! }
//! message QueryRequest { AuthContext auth = 1; QuerySpec query = 2; }
//! message AuthContext { string user = 1; string credential = 2; string quota = 3; }
//! message QuerySpec {
//!   string query = 1; string query_id = 2; string format = 3;
//!   uint64 interactive_delay_ms = 4;
//!   google.protobuf.Duration max_execution_time = 5;
//! }
//! message CancelRequest { uint32 request_id = 1; }
//! message ServerMessage {
//!   optional uint32 request_id = 1; string query_id = 2;
//!   oneof payload { ResultChunk chunk = 3; google.rpc.Status status = 4; }
//! }
//! message ResultChunk { string payload = 1; }
//! ```

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientMessage {
    #[prost(uint32, optional, tag = "1")]
    pub request_id: Option<u32>,
    #[prost(oneof = "client_message::Payload", tags = "2, 3")]
    pub payload: Option<client_message::Payload>,
}

pub mod client_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Query(super::QueryRequest),
        #[prost(message, tag = "3")]
        Cancel(super::CancelRequest),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryRequest {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<AuthContext>,
    #[prost(message, optional, tag = "2")]
    pub query: Option<QuerySpec>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthContext {
    #[prost(string, tag = "1")]
    pub user: String,
    #[prost(string, tag = "2")]
    pub credential: String,
    #[prost(string, tag = "3")]
    pub quota: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuerySpec {
    #[prost(string, tag = "1")]
    pub query: String,
    #[prost(string, tag = "2")]
    pub query_id: String,
    #[prost(string, tag = "3")]
    pub format: String,
    #[prost(uint64, tag = "4")]
    pub interactive_delay_ms: u64,
    #[prost(message, optional, tag = "5")]
    pub max_execution_time: Option<::prost_types::Duration>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CancelRequest {
    /// The `request_id` of the in-flight call to cancel.
    #[prost(uint32, tag = "1")]
    pub request_id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerMessage {
    #[prost(uint32, optional, tag = "1")]
    pub request_id: Option<u32>,
    #[prost(string, tag = "2")]
    pub query_id: String,
    #[prost(oneof = "server_message::Payload", tags = "3, 4")]
    pub payload: Option<server_message::Payload>,
}

pub mod server_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "3")]
        Chunk(super::ResultChunk),
        /// Terminal frame of a call. Nothing follows it for the same `request_id`.
        #[prost(message, tag = "4")]
        Status(super::google::rpc::Status),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultChunk {
    #[prost(string, tag = "1")]
    pub payload: String,
}

pub mod google {
    pub mod rpc {
        /// Mirror of `google.rpc.Status`.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Status {
            #[prost(int32, tag = "1")]
            pub code: i32,
            #[prost(string, tag = "2")]
            pub message: String,
            #[prost(message, repeated, tag = "3")]
            pub details: Vec<::prost_types::Any>,
        }

        /// Mirror of `google.rpc.Code`.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum Code {
            Ok = 0,
            Cancelled = 1,
            Unknown = 2,
            InvalidArgument = 3,
            DeadlineExceeded = 4,
            NotFound = 5,
            AlreadyExists = 6,
            PermissionDenied = 7,
            ResourceExhausted = 8,
            FailedPrecondition = 9,
            Aborted = 10,
            OutOfRange = 11,
            Unimplemented = 12,
            Internal = 13,
            Unavailable = 14,
            DataLoss = 15,
            Unauthenticated = 16,
        }
    }
}

impl ServerMessage {
    /// A chunk frame for an in-flight call.
    #[must_use]
    pub fn chunk(request_id: Option<u32>, query_id: &str, payload: String) -> Self {
        Self {
            request_id,
            query_id: query_id.to_owned(),
            payload: Some(server_message::Payload::Chunk(ResultChunk { payload })),
        }
    }

    /// The terminal status frame of a call.
    #[must_use]
    pub fn status(request_id: Option<u32>, query_id: &str, status: google::rpc::Status) -> Self {
        Self {
            request_id,
            query_id: query_id.to_owned(),
            payload: Some(server_message::Payload::Status(status)),
        }
    }
}
