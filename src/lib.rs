//! A single node of a [Chord distributed hash table][w:chord]: a
//! peer-to-peer overlay that partitions a flat key space across a ring of
//! cooperating nodes and resolves any key to its owning node in O(log N)
//! hops.
//!
//! # Architecture
//!
//! Five cooperating parts, described in their own modules:
//!
//! - [`identifier`] -- hashing and modular interval predicates on the
//!   m-bit ring.
//! - [`state`] -- successor, predecessor, finger table, behind a single
//!   reentrant lock.
//! - [`stabilization`] -- the periodic maintenance protocol that keeps the
//!   ring correct as peers join, leave, or crash.
//! - [`node`] -- routing (`find_successor`, `closest_preceding_node`) and
//!   client KV operations, composed from the two above plus a [`store`].
//! - [`transport`] -- a proxy presenting a remote peer's method surface
//!   over a JSON-RPC call, carried by the hand-rolled HTTP framing in
//!   [`http`].
//!
//! A client RPC arrives at the single listener, is decoded by
//! [`handler`], routed to the owning peer, served locally against the
//! store or forwarded, and the response encoded back as JSON. A
//! background thread drives the maintenance protocol independently of
//! client traffic.
//!
//! [w:chord]: https://en.wikipedia.org/wiki/Chord_(peer-to-peer)

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod identifier;
pub mod node;
pub mod rpc;
pub mod stabilization;
pub mod state;
pub mod store;
pub mod transport;

pub use error::{NodeError, Result};
pub use node::Node;

use crate::config::NodeConfig;
use crate::error::TransportError;
use crate::handler::DhtHandler;
use crate::stabilization::MaintenanceWorker;
use crate::store::Store;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default outbound RPC timeout, used for both client ops and maintenance.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Worker threads serving inbound HTTP/JSON-RPC connections.
pub const HTTP_WORKERS: usize = 8;

/// Builds and runs one node to completion.
///
/// Initializes it (creating a new ring or joining one through
/// `config.remote_node`), starts the maintenance worker and the HTTP
/// listener, and blocks until SIGINT, at which point it shuts the
/// maintenance worker down, hands its local store off to its successor,
/// and returns.
pub fn run(config: NodeConfig) -> Result<()> {
    let store = Store::open(&config.db_path)?;
    let node = Arc::new(Node::initialize(
        config.advertised_addr(),
        store,
        identifier::DEFAULT_RING_BITS,
        DEFAULT_TIMEOUT,
        config.remote_node.as_deref(),
    )?);

    info!(
        "node {} initialized, successor={:?}",
        node.self_addr(),
        node.state_snapshot().successor
    );

    let worker = MaintenanceWorker::spawn(Arc::clone(&node));

    let handler = Arc::new(DhtHandler::new(Arc::clone(&node)));
    let bind_addr = config.bind_socket_addr();
    let _server_handle = http::Server::new(handler)
        .listen(bind_addr.clone(), HTTP_WORKERS)
        .map_err(|source| TransportError::Io {
            addr: bind_addr.clone(),
            source,
        })?;
    info!("listening on {}", bind_addr);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .expect("failed to install SIGINT handler");
    }

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    info!("shutting down node {}", node.self_addr());
    worker.shutdown();
    node.leave();

    Ok(())
}
