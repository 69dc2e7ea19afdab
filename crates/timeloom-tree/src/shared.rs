//! Shared tree handle
//!
//! The tree is the one resource that needs exclusive mutation access.
//! Readers (front-ends, analysis) take the read half; the crunching manager
//! holds the write half for the whole of every sync.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::tree::Tree;

/// A history tree behind its read/write lock.
#[derive(Debug, Default)]
pub struct SharedTree {
    lock: RwLock<Tree>,
}

impl SharedTree {
    pub fn new(tree: Tree) -> Self {
        Self {
            lock: RwLock::new(tree),
        }
    }

    /// Acquire shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, Tree> {
        self.lock.read().expect("tree lock poisoned - fatal error")
    }

    /// Acquire exclusive write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, Tree> {
        self.lock.write().expect("tree lock poisoned - fatal error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeloom_foundation::{State, Value};

    #[test]
    fn test_read_after_write() {
        let shared = SharedTree::default();
        let root = shared.write().add_root(State::initial(Value::Int(1)));

        let tree = shared.read();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.node(root).unwrap().state.data, Value::Int(1));
    }
}
