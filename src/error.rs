//! The three error kinds used throughout the crate.
//!
//! Maintenance code (stabilize, notify, fix_fingers, check_predecessor)
//! catches all of these, logs at `warn`, and either leaves state unchanged
//! or ejects the affected finger. Client-facing operations propagate them
//! to the caller, where the RPC handler turns them into an HTTP error
//! response.

use thiserror::Error;

/// An outbound RPC failed or timed out.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error talking to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {addr} timed out")]
    Timeout { addr: String },

    #[error("malformed response from {addr}: {reason}")]
    MalformedResponse { addr: String, reason: String },

    #[error("{addr} returned an error: {message}")]
    Remote { addr: String, message: String },
}

/// A local store operation failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] sled::Error),

    #[error("value for key {key:?} could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A peer returned a semantically invalid response, or a defensive bound
/// (such as the `find_successor` hop limit) was exceeded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("find_successor exceeded its hop limit of {limit} while resolving {id}")]
    HopLimitExceeded { id: String, limit: u32 },

    #[error("unexpected response for method {method}: {reason}")]
    UnexpectedResponse { method: String, reason: String },
}

/// The union of every error this crate can produce, used as the return
/// type for operations that may fail for more than one reason (routing
/// calls out over the network *and* touches local storage).
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, NodeError>;
