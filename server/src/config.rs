//! Server configuration module.
//!
//! This module provides configuration loading for the query streaming server
//! from environment variables.
//!
//! # Environment Variables
//!
//! - `QS_LISTEN_ADDRESS`: Address to bind (default: `0.0.0.0`)
//! - `QS_LISTEN_PORT`: Port to listen on (default: `9001`)
//! - `QS_USERS`: Comma-separated `user=password` pairs (default: `default=`).
//!   An empty password accepts any credential.
//! - `QS_JWT_SECRET`: Optional HS256 secret; a JWT whose `sub` is the user is
//!   accepted as that user's credential.
//! - `QS_QUOTAS`: Comma-separated `class=max_concurrent_calls` pairs
//!   (default: `default=64`)
//! - `QS_MAX_BLOCK_SIZE`: Rows per engine block (default: `65536`)
//! - `QS_MAX_CHUNK_BYTES`: Payload size that forces a flush (default: `1048576`)
//! - `QS_CALL_CHANNEL_CAPACITY`: Buffered chunks per call (default: `16`)
//! - `QS_CONNECTION_CHANNEL_CAPACITY`: Buffered frames per connection (default: `64`)
//!
//! # Invariants
//!
//! - `listen_port` is always a valid port number
//! - every user name and quota class name is non-empty
//! - block size, chunk size, channel capacities and quota limits are non-zero

use std::collections::BTreeMap;
use std::net::IpAddr;

/// Server configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()` every numeric field is non-zero and
/// `quotas` contains at least one class.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub listen_address: IpAddr,
    /// Port to listen on for WebSocket connections.
    pub listen_port: u16,
    /// Configured users and their passwords. An empty password accepts any credential.
    pub users: BTreeMap<String, String>,
    /// Optional HS256 secret for JWT credentials.
    pub jwt_secret: Option<Vec<u8>>,
    /// Quota classes and their concurrent call limit.
    pub quotas: BTreeMap<String, usize>,
    /// Maximum number of rows the engine returns per block.
    pub max_block_size: usize,
    /// Buffered payload size that forces a chunk flush.
    pub max_chunk_bytes: usize,
    /// Chunks buffered between a call's producer and its connection.
    pub call_channel_capacity: usize,
    /// Frames buffered between a connection's calls and its socket.
    pub connection_channel_capacity: usize,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::from([0, 0, 0, 0]),
            listen_port: Self::DEFAULT_PORT,
            users: BTreeMap::from([(Self::DEFAULT_USER.to_owned(), String::new())]),
            jwt_secret: None,
            quotas: BTreeMap::from([(
                Self::DEFAULT_QUOTA.to_owned(),
                Self::DEFAULT_QUOTA_MAX_CALLS,
            )]),
            max_block_size: Self::DEFAULT_MAX_BLOCK_SIZE,
            max_chunk_bytes: Self::DEFAULT_MAX_CHUNK_BYTES,
            call_channel_capacity: Self::DEFAULT_CALL_CHANNEL_CAPACITY,
            connection_channel_capacity: Self::DEFAULT_CONNECTION_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Default port for the streaming endpoint.
    pub const DEFAULT_PORT: u16 = 9001;
    /// User configured when `QS_USERS` is not set.
    pub const DEFAULT_USER: &'static str = "default";
    /// Quota class used when a caller leaves it empty.
    pub const DEFAULT_QUOTA: &'static str = "default";
    pub const DEFAULT_QUOTA_MAX_CALLS: usize = 64;
    pub const DEFAULT_MAX_BLOCK_SIZE: usize = 65_536;
    pub const DEFAULT_MAX_CHUNK_BYTES: usize = 1024 * 1024;
    pub const DEFAULT_CALL_CHANNEL_CAPACITY: usize = 16;
    pub const DEFAULT_CONNECTION_CHANNEL_CAPACITY: usize = 64;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set but cannot be parsed, or if a
    /// numeric setting is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_address = match lookup("QS_LISTEN_ADDRESS") {
            Some(value) => value.parse::<IpAddr>().map_err(|_| ConfigError::InvalidValue {
                name: "QS_LISTEN_ADDRESS".to_owned(),
                message: format!("'{value}' is not a valid IP address"),
            })?,
            None => defaults.listen_address,
        };

        let listen_port = match lookup("QS_LISTEN_PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "QS_LISTEN_PORT".to_owned(),
                message: format!("'{value}' is not a valid port number (must be 0-65535)"),
            })?,
            None => defaults.listen_port,
        };

        let users = match lookup("QS_USERS") {
            Some(value) => parse_users(&value)?,
            None => defaults.users,
        };

        let jwt_secret = match lookup("QS_JWT_SECRET") {
            Some(value) if value.is_empty() => {
                return Err(ConfigError::InvalidValue {
                    name: "QS_JWT_SECRET".to_owned(),
                    message: "must not be empty when set".to_owned(),
                });
            }
            Some(value) => Some(value.into_bytes()),
            None => None,
        };

        let quotas = match lookup("QS_QUOTAS") {
            Some(value) => parse_quotas(&value)?,
            None => defaults.quotas,
        };

        Ok(Self {
            listen_address,
            listen_port,
            users,
            jwt_secret,
            quotas,
            max_block_size: load_non_zero(&lookup, "QS_MAX_BLOCK_SIZE", defaults.max_block_size)?,
            max_chunk_bytes: load_non_zero(
                &lookup,
                "QS_MAX_CHUNK_BYTES",
                defaults.max_chunk_bytes,
            )?,
            call_channel_capacity: load_non_zero(
                &lookup,
                "QS_CALL_CHANNEL_CAPACITY",
                defaults.call_channel_capacity,
            )?,
            connection_channel_capacity: load_non_zero(
                &lookup,
                "QS_CONNECTION_CHANNEL_CAPACITY",
                defaults.connection_channel_capacity,
            )?,
        })
    }
}

/// Load a non-zero count, falling back to `default` when unset.
fn load_non_zero<F>(lookup: &F, name: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_owned(),
            message: format!("'{value}' is not a positive integer"),
        }),
    }
}

/// Parse `user=password,user2=` into a map.
fn parse_users(value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut users = BTreeMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, password) = entry.split_once('=').unwrap_or((entry, ""));
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "QS_USERS".to_owned(),
                message: format!("entry '{entry}' has an empty user name"),
            });
        }
        users.insert(name.to_owned(), password.to_owned());
    }
    if users.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "QS_USERS".to_owned(),
            message: "at least one user must be configured".to_owned(),
        });
    }
    Ok(users)
}

/// Parse `class=limit,class2=limit` into a map.
fn parse_quotas(value: &str) -> Result<BTreeMap<String, usize>, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        name: "QS_QUOTAS".to_owned(),
        message,
    };

    let mut quotas = BTreeMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, limit)) = entry.split_once('=') else {
            return Err(invalid(format!("entry '{entry}' must look like class=limit")));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid(format!("entry '{entry}' has an empty class name")));
        }
        let limit = match limit.trim().parse::<usize>() {
            Ok(limit) if limit > 0 => limit,
            _ => return Err(invalid(format!("entry '{entry}' needs a positive limit"))),
        };
        quotas.insert(name.to_owned(), limit);
    }
    if quotas.is_empty() {
        return Err(invalid("at least one quota class must be configured".to_owned()));
    }
    Ok(quotas)
}
