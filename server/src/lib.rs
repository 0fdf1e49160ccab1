// Life of a call:
// 1. A binary WebSocket frame comes in and decodes into a ClientMessage
// 2. Convert / validate it into an AuthContext + QuerySpec
// 3. Admit the call: authenticate the user, take a quota slot
// 4. A blocking worker hands the text to the engine and drains its cursor,
//    formatting rows into chunks paced by the interactive delay
// 5. Chunks flow through the call's bounded channel, then the connection's,
//    then out to the socket
// 6. Exactly one status frame ends the call
//
// System components:
//  - Query engine (in-memory, behind the QueryEngine trait)
//  - Streaming service (admission, producers, call streams)
//  - Connection layer (request_id multiplexing, cancel)

pub mod auth;
pub mod call;
pub mod client;
mod client_connection;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod proto;
pub mod server;
pub mod service;
pub mod types;


pub use client_connection::ClientConnection;
pub use error::CallError;
pub use service::{CallStream, QueryService};
