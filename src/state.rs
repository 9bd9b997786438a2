//! Node state (C2): successor, predecessor, finger table and the cursor
//! used to round-robin finger repair, all behind a single reentrant lock.
//!
//! The lock has to be reentrant because [`crate::stabilization::stabilize`]
//! calls `notify` directly when `successor == self`, without going back out
//! through the network — see the module docs on [`NodeState::with_lock`].

use parking_lot::ReentrantMutex;
use std::cell::RefCell;

/// Snapshot-friendly inner state, guarded by the node's reentrant lock.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    pub successor: Option<String>,
    pub predecessor: Option<String>,
    pub fingers: Vec<Option<String>>,
}

struct Inner {
    successor: Option<String>,
    predecessor: Option<String>,
    fingers: Vec<Option<String>>,
    next_finger_cursor: u32,
}

/// Holds the mutable ring pointers for one node behind a reentrant lock.
///
/// A plain `Mutex` would deadlock the owning thread the moment stabilize
/// takes the lock and then calls `notify` on itself (the `successor ==
/// self` case from the maintenance protocol); `ReentrantMutex` lets the
/// same thread re-enter. Because a reentrant mutex can only ever hand out
/// a shared reference (multiple live guards on one thread would otherwise
/// alias), the guarded value is a `RefCell`.
pub struct NodeState {
    ring_bits: u32,
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl NodeState {
    pub fn new(ring_bits: u32) -> Self {
        NodeState {
            ring_bits,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                successor: None,
                predecessor: None,
                fingers: vec![None; ring_bits as usize],
                next_finger_cursor: 1,
            })),
        }
    }

    pub fn ring_bits(&self) -> u32 {
        self.ring_bits
    }

    pub fn successor(&self) -> Option<String> {
        let guard = self.inner.lock();
        guard.borrow().successor.clone()
    }

    pub fn set_successor(&self, addr: Option<String>) {
        let guard = self.inner.lock();
        guard.borrow_mut().successor = addr;
    }

    pub fn predecessor(&self) -> Option<String> {
        let guard = self.inner.lock();
        guard.borrow().predecessor.clone()
    }

    pub fn set_predecessor(&self, addr: Option<String>) {
        let guard = self.inner.lock();
        guard.borrow_mut().predecessor = addr;
    }

    pub fn finger(&self, index: usize) -> Option<String> {
        let guard = self.inner.lock();
        guard.borrow().fingers[index].clone()
    }

    pub fn set_finger(&self, index: usize, addr: Option<String>) {
        let guard = self.inner.lock();
        guard.borrow_mut().fingers[index] = addr;
    }

    pub fn fingers(&self) -> Vec<Option<String>> {
        let guard = self.inner.lock();
        guard.borrow().fingers.clone()
    }

    /// Returns the current finger-repair cursor and advances it modulo
    /// `ring_bits`, starting (and wrapping back to) 1 — finger 0 is always
    /// serviced by successor logic, so it is excluded from round-robin
    /// repair.
    pub fn next_finger_index(&self) -> usize {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let current = inner.next_finger_cursor;
        inner.next_finger_cursor = (current % (self.ring_bits - 1)) + 1;
        current as usize
    }

    /// Takes a coherent snapshot of everything the lock guards, for the
    /// status page and `dump_state`.
    pub fn snapshot(&self) -> StateSnapshot {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        StateSnapshot {
            successor: inner.successor.clone(),
            predecessor: inner.predecessor.clone(),
            fingers: inner.fingers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_starts_at_one_and_wraps() {
        let state = NodeState::new(4);
        assert_eq!(state.next_finger_index(), 1);
        assert_eq!(state.next_finger_index(), 2);
        assert_eq!(state.next_finger_index(), 3);
        assert_eq!(state.next_finger_index(), 1);
    }

    #[test]
    fn reentrant_lock_tolerates_nested_acquire() {
        let state = NodeState::new(8);
        let guard = state.inner.lock();
        // A second, nested lock acquisition on the same thread must not
        // deadlock -- this is exactly what stabilize() relies on when it
        // calls notify() on itself.
        let _inner_guard = state.inner.lock();
        assert!(guard.borrow().successor.is_none());
    }
}
