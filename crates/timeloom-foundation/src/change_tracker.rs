//! Revision-based change tracking
//!
//! Mutable records that want observers to notice their changes carry a
//! `Revision` bumped on every mutation; a `ChangeTracker` remembers the last
//! revision it checked in per key and reports whether it has moved since.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Monotonic revision counter carried by mutable records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Revision(u64);

impl Revision {
    /// Advance to the next revision.
    pub fn bump(&mut self) {
        self.0 += 1;
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Tracks the last revision seen per key.
///
/// `check_in` reports whether the key's revision moved since the previous
/// check-in by this tracker instance, and records the new one. A key never
/// checked in before reports changed.
#[derive(Debug)]
pub struct ChangeTracker<K> {
    last_seen: HashMap<K, Revision>,
}

impl<K: Eq + Hash> ChangeTracker<K> {
    pub fn new() -> Self {
        Self {
            last_seen: HashMap::new(),
        }
    }

    /// Report whether `revision` differs from the last one checked in for
    /// `key`, then record it.
    pub fn check_in(&mut self, key: K, revision: Revision) -> bool {
        self.last_seen.insert(key, revision) != Some(revision)
    }

    /// Stop tracking a key.
    pub fn forget(&mut self, key: &K) {
        self.last_seen.remove(key);
    }
}

impl<K> Default for ChangeTracker<K> {
    fn default() -> Self {
        Self {
            last_seen: HashMap::new(),
        }
    }
}
