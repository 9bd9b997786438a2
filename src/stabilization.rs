//! The maintenance protocol (C3): `stabilize`, `fix_fingers` and
//! `check_predecessor`, driven at a fixed cadence by [`MaintenanceWorker`]
//! on a dedicated background thread.
//!
//! Each tick is single-attempt and short-timeout; failures are logged and
//! leave state unchanged, except `check_predecessor`, which clears a
//! predecessor that stops responding. None of this ever panics the worker
//! thread -- an unreachable peer just delays convergence.

use crate::identifier::{in_exc, Identify};
use crate::node::Node;
use crate::transport::RemoteNode;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Gap between stabilize / the fix_fingers burst / check_predecessor.
/// A heuristic, not a protocol requirement -- kept as a named constant so
/// tests can shrink it rather than waiting out the real cadence.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// How many `fix_fingers` calls run back to back per cycle.
pub const FIX_FINGERS_PER_CYCLE: u32 = 4;

/// Deadline for joining the worker thread on shutdown; past this the
/// process proceeds regardless of whether the thread has exited.
pub const SHUTDOWN_JOIN_DEADLINE: Duration = Duration::from_secs(30);

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Verifies and updates `node`'s immediate successor, then asserts `node`
/// as that successor's predecessor.
pub fn stabilize(node: &Node) {
    let successor = match node.state().successor() {
        Some(successor) => successor,
        None => return,
    };

    let predecessor_of_successor = if successor == node.self_addr() {
        node.current_predecessor()
    } else {
        match RemoteNode::new(&successor, node.timeout()).current_predecessor() {
            Ok(predecessor) => predecessor,
            Err(err) => {
                warn!("stabilize: could not reach successor {}: {}", successor, err);
                None
            }
        }
    };

    if let Some(x) = &predecessor_of_successor {
        if x != &successor {
            let x_id = x.identifier(node.ring_bits());
            let successor_id = successor.identifier(node.ring_bits());
            if in_exc(&x_id, node.self_id(), &successor_id) {
                debug!("stabilize: adopting closer successor {}", x);
                node.state().set_successor(Some(x.clone()));
            }
        }
    }

    let successor = node.state().successor().unwrap_or(successor);
    if successor == node.self_addr() {
        node.notify(node.self_addr());
    } else if let Err(err) = RemoteNode::new(&successor, node.timeout()).notify(node.self_addr())
    {
        warn!("stabilize: notify to {} failed: {}", successor, err);
    }
}

/// Refreshes one finger table entry, chosen round-robin by the state's
/// cursor, ejecting it on any RPC failure rather than leaving it stale.
pub fn fix_fingers(node: &Node) {
    let i = node.state().next_finger_index();
    let target = node.self_id().plus_power_of_two(i as u32);

    match node.find_successor(&target) {
        Ok(addr) => node.state().set_finger(i, Some(addr)),
        Err(err) => {
            warn!("fix_fingers: could not resolve finger {}: {}", i, err);
            node.state().set_finger(i, None);
        }
    }
}

/// Pings the current predecessor, clearing it if it fails to respond. A
/// stale predecessor would otherwise refuse legitimate notifies forever.
pub fn check_predecessor(node: &Node) {
    let predecessor = match node.current_predecessor() {
        Some(predecessor) => predecessor,
        None => return,
    };

    if predecessor == node.self_addr() {
        return;
    }

    if let Err(err) = RemoteNode::new(&predecessor, node.timeout()).ping() {
        warn!(
            "check_predecessor: {} did not respond, clearing: {}",
            predecessor, err
        );
        node.state().set_predecessor(None);
    }
}

/// Sleeps up to `total`, waking early if `shutdown` is set in the
/// meantime, returning whether shutdown was observed. Polls in small
/// slices so shutdown is noticed promptly instead of only between
/// whole-second ticks.
fn sleep_unless_shutdown(shutdown: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }
        let chunk = remaining.min(SHUTDOWN_POLL_INTERVAL);
        thread::sleep(chunk);
        remaining = remaining.saturating_sub(chunk);
    }
    shutdown.load(Ordering::SeqCst)
}

/// Owns the background maintenance thread: one `stabilize` tick, a pause,
/// four `fix_fingers` ticks, a pause, one `check_predecessor` tick, a final
/// pause -- roughly three seconds per cycle, repeated until shutdown.
pub struct MaintenanceWorker {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MaintenanceWorker {
    pub fn spawn(node: Arc<Node>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            while !worker_shutdown.load(Ordering::SeqCst) {
                stabilize(&node);
                if sleep_unless_shutdown(&worker_shutdown, TICK_INTERVAL) {
                    break;
                }

                for _ in 0..FIX_FINGERS_PER_CYCLE {
                    fix_fingers(&node);
                }
                if sleep_unless_shutdown(&worker_shutdown, TICK_INTERVAL) {
                    break;
                }

                check_predecessor(&node);
                if sleep_unless_shutdown(&worker_shutdown, TICK_INTERVAL) {
                    break;
                }
            }
        });

        MaintenanceWorker {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals the worker to stop and waits for it, up to
    /// [`SHUTDOWN_JOIN_DEADLINE`]. Past the deadline the caller proceeds
    /// regardless -- shutdown must never hang indefinitely on a wedged
    /// worker thread.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return,
        };

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = handle.join();
            let _ = tx.send(());
        });

        if rx.recv_timeout(SHUTDOWN_JOIN_DEADLINE).is_err() {
            warn!("maintenance worker did not exit within the shutdown deadline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn node(addr: &str) -> Node {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        std::mem::forget(dir);
        Node::initialize(addr, store, 8, Duration::from_millis(200), None).unwrap()
    }

    #[test]
    fn stabilize_on_singleton_ring_notifies_self() {
        let n = node("127.0.0.1:9101");
        assert!(n.current_predecessor().is_none());
        stabilize(&n);
        assert_eq!(n.current_predecessor().as_deref(), Some(n.self_addr()));
    }

    #[test]
    fn fix_fingers_on_singleton_ring_points_back_to_self() {
        let n = node("127.0.0.1:9102");
        fix_fingers(&n);
        let fingers = n.state_snapshot().fingers;
        assert!(fingers.iter().any(|f| f.as_deref() == Some(n.self_addr())));
    }

    #[test]
    fn check_predecessor_is_a_no_op_when_absent() {
        let n = node("127.0.0.1:9103");
        check_predecessor(&n);
        assert!(n.current_predecessor().is_none());
    }

    #[test]
    fn check_predecessor_clears_unreachable_peer() {
        let n = node("127.0.0.1:9104");
        n.notify("127.0.0.1:1"); // an address nothing listens on
        assert!(n.current_predecessor().is_some());
        check_predecessor(&n);
        assert!(n.current_predecessor().is_none());
    }

    #[test]
    fn worker_spawns_and_shuts_down_promptly() {
        let n = Arc::new(node("127.0.0.1:9105"));
        let worker = MaintenanceWorker::spawn(Arc::clone(&n));
        thread::sleep(Duration::from_millis(50));
        worker.shutdown();
        // Reaching here without hanging is the assertion: shutdown joined
        // well within the deadline.
        assert!(n.get_local("anything", None).unwrap().is_none());
    }
}
