//! In-memory counter storage shared by the hub and every replica.
//!
//! Each node process owns exactly one [`CounterStore`]. It is the only shared
//! mutable resource in the process, so every HTTP handler reaches it through
//! an `Arc`.
//!
//! # Locking
//!
//! The whole mapping sits behind one store-wide `RwLock`:
//!
//! - [`CounterStore::read`] and [`CounterStore::snapshot`] take the shared lock
//!   and may run concurrently with each other.
//! - [`CounterStore::apply_delta`], [`CounterStore::write`] and
//!   [`CounterStore::replace_all`] take the exclusive lock, so a delta can never
//!   interleave with a snapshot install on the same key.
//!
//! A `replace_all` therefore blocks every reader and writer while it swaps the
//! map. Snapshots are only used for bootstrap, so that pause is rare.

use std::collections::BTreeMap;

use parking_lot::RwLock;

/// Full point-in-time copy of a store: counter id to cumulative value.
///
/// BTreeMap keeps the JSON output of `/items` and `/syncall` stable, which
/// makes diffs between nodes easy to read.
pub type Snapshot = BTreeMap<String, i64>;

/// Concurrency-safe mapping from counter id to signed value.
///
/// Unknown ids read as 0. Values are the wrapping sum of every delta applied
/// at this node; wrapping keeps addition commutative even at the edges of
/// `i64`.
#[derive(Debug, Default)]
pub struct CounterStore {
    counters: RwLock<Snapshot>,
}

impl CounterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `snapshot`.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            counters: RwLock::new(snapshot),
        }
    }

    /// Returns the current value of `id`, or 0 if the id has never been seen.
    pub fn read(&self, id: &str) -> i64 {
        self.counters.read().get(id).copied().unwrap_or(0)
    }

    /// Adds `delta` to `id` and returns the new value.
    ///
    /// The read-modify-write happens under one exclusive guard, so concurrent
    /// deltas on the same id never lose an update.
    pub fn apply_delta(&self, id: &str, delta: i64) -> i64 {
        let mut counters = self.counters.write();
        let value = counters.entry(id.to_string()).or_insert(0);
        *value = value.wrapping_add(delta);
        *value
    }

    /// Sets `id` to an absolute value, discarding whatever was there.
    pub fn write(&self, id: &str, value: i64) {
        self.counters.write().insert(id.to_string(), value);
    }

    /// Discards the whole mapping and installs `snapshot` in its place.
    ///
    /// This is a destructive replace, not a merge: ids missing from
    /// `snapshot` are gone afterwards.
    pub fn replace_all(&self, snapshot: Snapshot) {
        *self.counters.write() = snapshot;
    }

    /// Clones the whole mapping under the shared lock.
    ///
    /// The copy reflects every delta applied before the lock was taken and
    /// none applied after; callers pushing it elsewhere race with later
    /// updates.
    pub fn snapshot(&self) -> Snapshot {
        self.counters.read().clone()
    }

    pub fn len(&self) -> usize {
        self.counters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.read().is_empty()
    }
}
