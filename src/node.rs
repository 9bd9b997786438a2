//! Routing and KV operations (C4), plus the node's lifecycle.
//!
//! `Node::initialize` is the only constructor this module exposes: there is
//! no bare `Node::new` that hands back a value with `successor` absent,
//! because every other method here assumes a successor is always present.
//! See the module docs on [`Node::initialize`].

use crate::error::{ProtocolError, Result};
use crate::identifier::{in_exc, in_inc, Identifier, Identify};
use crate::state::{NodeState, StateSnapshot};
use crate::store::Store;
use crate::transport::RemoteNode;
use log::warn;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// A single Chord node: its own identity, ring pointers, local store, and
/// the knobs (timeout, hop limit) governing how far it reaches over the
/// network.
pub struct Node {
    self_addr: String,
    self_id: Identifier,
    state: NodeState,
    store: Store,
    timeout: Duration,
    hop_limit: u32,
    started_at: Instant,
}

impl Node {
    /// Builds a node and either seeds a brand-new ring (`bootstrap =
    /// None`) or joins an existing one through `bootstrap` (`Some(addr)`).
    ///
    /// This is the only way to obtain a `Node`: by the time it returns, the
    /// invariant "`successor` is always present" already holds, so every
    /// other method on this type can assume it without re-checking.
    pub fn initialize(
        self_addr: impl Into<String>,
        store: Store,
        ring_bits: u32,
        timeout: Duration,
        bootstrap: Option<&str>,
    ) -> Result<Self> {
        let self_addr = self_addr.into();
        let self_id = self_addr.identifier(ring_bits);

        let node = Node {
            self_addr: self_addr.clone(),
            self_id,
            state: NodeState::new(ring_bits),
            store,
            timeout,
            hop_limit: 2 * ring_bits,
            started_at: Instant::now(),
        };

        match bootstrap {
            None => {
                node.state.set_successor(Some(self_addr));
                node.state.set_predecessor(None);
            }
            Some(remote_addr) => {
                let remote = RemoteNode::new(remote_addr, timeout);
                let successor =
                    remote.find_successor(&node.self_id.to_string(), node.hop_limit)?;
                node.state.set_successor(Some(successor));
                node.state.set_predecessor(None);
            }
        }

        Ok(node)
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn self_id(&self) -> &Identifier {
        &self.self_id
    }

    pub fn ring_bits(&self) -> u32 {
        self.state.ring_bits()
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn remote(&self, addr: &str) -> RemoteNode {
        RemoteNode::new(addr, self.timeout)
    }

    // --- C4: routing -----------------------------------------------------

    /// Resolves the node owning `id`, starting with the full hop budget.
    pub fn find_successor(&self, id: &Identifier) -> Result<String> {
        self.find_successor_bounded(id, self.hop_limit)
    }

    /// As [`Node::find_successor`], but with an explicit hop budget carried
    /// over from an inbound RPC -- each hop decrements it by one, and it
    /// surfaces `ProtocolError::HopLimitExceeded` at zero instead of
    /// recursing through peers forever during churn.
    pub fn find_successor_bounded(&self, id: &Identifier, hops_remaining: u32) -> Result<String> {
        if hops_remaining == 0 {
            return Err(ProtocolError::HopLimitExceeded {
                id: id.to_string(),
                limit: self.hop_limit,
            }
            .into());
        }

        let successor = self
            .state
            .successor()
            .expect("an initialized node always has a successor");
        let successor_id = successor.identifier(self.ring_bits());

        if in_inc(id, &self.self_id, &successor_id) {
            return Ok(successor);
        }

        let preceding = self.closest_preceding_node(id);
        if preceding == self.self_addr {
            // Empty or stale finger table: successor is the best we have.
            return Ok(successor);
        }

        let remote = self.remote(&preceding);
        Ok(remote.find_successor(&id.to_string(), hops_remaining - 1)?)
    }

    /// Scans fingers from the highest index down to 1, returning the first
    /// one strictly between self and `id`; falls back to self.
    pub fn closest_preceding_node(&self, id: &Identifier) -> String {
        let fingers = self.state.fingers();
        for i in (1..fingers.len()).rev() {
            if let Some(addr) = &fingers[i] {
                let finger_id = addr.identifier(self.ring_bits());
                if in_exc(&finger_id, &self.self_id, id) {
                    return addr.clone();
                }
            }
        }
        self.self_addr.clone()
    }

    fn resolve_owner(&self, key: &str) -> Result<String> {
        let key_id = key.identifier(self.ring_bits());
        self.find_successor(&key_id)
    }

    // --- C4: client KV operations -----------------------------------------

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let owner = self.resolve_owner(key)?;
        if owner == self.self_addr {
            self.get_local(key, None)
        } else {
            Ok(self.remote(&owner).get_local(key, None)?)
        }
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let owner = self.resolve_owner(key)?;
        if owner == self.self_addr {
            self.set_local(key, value)
        } else {
            Ok(self.remote(&owner).set_local(key, value)?)
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let owner = self.resolve_owner(key)?;
        if owner == self.self_addr {
            self.remove_local(key)
        } else {
            Ok(self.remote(&owner).remove_local(key)?)
        }
    }

    // --- C4: local KV operations -------------------------------------------

    pub fn has_local_key(&self, key: &str) -> Result<bool> {
        Ok(self.store.exists(key)?)
    }

    pub fn get_local(&self, key: &str, default: Option<Value>) -> Result<Option<Value>> {
        Ok(self.store.get(key, default)?)
    }

    pub fn set_local(&self, key: &str, value: Value) -> Result<()> {
        Ok(self.store.set(key, &value)?)
    }

    pub fn remove_local(&self, key: &str) -> Result<()> {
        Ok(self.store.remove(key)?)
    }

    pub fn get_all_local(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self.store.get_all()?)
    }

    pub fn set_local_bulk(&self, pairs: BTreeMap<String, Value>) -> Result<()> {
        Ok(self.store.set_bulk(&pairs)?)
    }

    // --- C3 surface used by the handler layer / stabilization module ------

    pub fn current_predecessor(&self) -> Option<String> {
        self.state.predecessor()
    }

    /// Accepts `other` as predecessor if none is set yet, or if `other`
    /// lies strictly between the current predecessor and self -- i.e. the
    /// predecessor only ever moves forward, toward self, never backward.
    pub fn notify(&self, other: &str) {
        let other_id = other.identifier(self.ring_bits());
        let accept = match self.state.predecessor() {
            None => true,
            Some(predecessor) => {
                let predecessor_id = predecessor.identifier(self.ring_bits());
                in_exc(&other_id, &predecessor_id, &self.self_id)
            }
        };
        if accept {
            self.state.set_predecessor(Some(other.to_string()));
        }
    }

    // --- Graceful leave ------------------------------------------------------

    /// Hands off the full local store to the successor, best effort.
    /// Errors are logged and swallowed: a failed hand-off loses data but
    /// must never block shutdown.
    pub fn leave(&self) {
        let successor = match self.state.successor() {
            Some(successor) if successor != self.self_addr => successor,
            _ => return,
        };

        let snapshot = match self.store.get_all() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("graceful leave: failed to snapshot local store: {}", err);
                return;
            }
        };

        if snapshot.is_empty() {
            return;
        }

        if let Err(err) = self.remote(&successor).set_local_bulk(snapshot) {
            warn!(
                "graceful leave: hand-off to successor {} failed: {}",
                successor, err
            );
        }
    }

    // --- Introspection (status page, dump_state/dump_db RPCs) ---------------

    pub fn state_snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    pub fn dump_state(&self) -> Value {
        let snapshot = self.state.snapshot();
        json!({
            "self_addr": self.self_addr,
            "self_id": self.self_id.to_string(),
            "successor": snapshot.successor,
            "predecessor": snapshot.predecessor,
            "fingers": snapshot.fingers,
        })
    }

    pub fn dump_db(&self) -> Result<Value> {
        let all = self.store.get_all()?;
        Ok(Value::Object(all.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(addr: &str) -> Node {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        std::mem::forget(dir);
        Node::initialize(addr, store, 8, Duration::from_millis(200), None).unwrap()
    }

    #[test]
    fn create_yields_singleton_ring() {
        let n = node("127.0.0.1:9001");
        assert_eq!(n.state.successor().as_deref(), Some(n.self_addr()));
        assert!(n.state.predecessor().is_none());
    }

    #[test]
    fn singleton_find_successor_returns_self() {
        let n = node("127.0.0.1:9002");
        let id = "some-key".identifier(n.ring_bits());
        assert_eq!(n.find_successor(&id).unwrap(), n.self_addr());
    }

    #[test]
    fn local_kv_roundtrip() {
        let n = node("127.0.0.1:9003");
        assert!(n.get_local("k", None).unwrap().is_none());
        n.set_local("k", json!("v")).unwrap();
        assert_eq!(n.get_local("k", None).unwrap(), Some(json!("v")));
        n.remove_local("k").unwrap();
        assert!(n.get_local("k", None).unwrap().is_none());
    }

    #[test]
    fn client_ops_resolve_to_self_in_singleton_ring() {
        let n = node("127.0.0.1:9004");
        n.set("k", json!(42)).unwrap();
        assert_eq!(n.get("k").unwrap(), Some(json!(42)));
        n.remove("k").unwrap();
        assert_eq!(n.get("k").unwrap(), None);
    }

    #[test]
    fn closest_preceding_node_falls_back_to_self_with_empty_fingers() {
        let n = node("127.0.0.1:9005");
        let id = "anything".identifier(n.ring_bits());
        assert_eq!(n.closest_preceding_node(&id), n.self_addr());
    }

    #[test]
    fn notify_accepts_first_claim_then_only_forward_moves() {
        let n = node("127.0.0.1:9006");
        assert!(n.current_predecessor().is_none());

        n.notify("peer-a:1");
        let first = n.current_predecessor().unwrap();
        assert_eq!(first, "peer-a:1");

        // Re-asserting the same predecessor is idempotent.
        n.notify("peer-a:1");
        assert_eq!(n.current_predecessor().unwrap(), first);
    }

    #[test]
    fn find_successor_reports_hop_limit_when_exhausted() {
        let n = node("127.0.0.1:9007");
        let id = "somewhere-else".identifier(n.ring_bits());
        let err = n.find_successor_bounded(&id, 0).unwrap_err();
        match err {
            crate::error::NodeError::Protocol(ProtocolError::HopLimitExceeded { .. }) => {}
            other => panic!("expected HopLimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn leave_on_singleton_ring_is_a_no_op() {
        let n = node("127.0.0.1:9008");
        n.set_local("k", json!("v")).unwrap();
        n.leave();
        assert_eq!(n.get_local("k", None).unwrap(), Some(json!("v")));
    }
}
