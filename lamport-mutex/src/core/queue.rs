//! Pending-request queue ordered by extended Lamport time.

use std::collections::BTreeSet;

use crate::message::PeerId;

/// Ordering key for requests and audit records.
///
/// Compares by `(timestamp, peer)`: timestamp first, peer id as the
/// tie-break. This totally orders events whose clocks collide.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EventKey {
    pub timestamp: u64,
    pub peer: PeerId,
}

/// The per-peer queue of outstanding REQUESTs.
///
/// The head entry names the peer permitted to enter the critical section
/// next, once all acknowledgements are in. Each peer holds at most one
/// entry at a time.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct RequestQueue {
    entries: BTreeSet<EventKey>,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request entry. Returns `false`, leaving the queue
    /// untouched, if the peer is already queued.
    pub fn insert(&mut self, entry: EventKey) -> bool {
        if self.contains(entry.peer) {
            return false;
        }
        self.entries.insert(entry)
    }

    #[must_use]
    pub fn contains(&self, peer: PeerId) -> bool {
        self.entries.iter().any(|entry| entry.peer == peer)
    }

    /// The entry with the smallest extended Lamport time.
    #[must_use]
    pub fn head(&self) -> Option<EventKey> {
        self.entries.first().copied()
    }

    pub fn pop_head(&mut self) -> Option<EventKey> {
        self.entries.pop_first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
