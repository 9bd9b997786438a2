//! The request handler: dispatches decoded JSON-RPC calls to [`Node`]
//! methods and serves the read-only status page, both from the same
//! listener (§4.9).
//!
//! [`Node`]: crate::node::Node

pub use self::dispatch::DhtHandler;

mod dispatch;
mod status;
