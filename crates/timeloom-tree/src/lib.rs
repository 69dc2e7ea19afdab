//! Timeloom history tree
//!
//! The shared, branching history of simulation states. Crunchers never touch
//! the tree; the crunching manager is its sole writer, under the write half
//! of the `SharedTree` lock.

pub mod error;
pub mod shared;
pub mod tree;

pub use error::{Error, Result};
pub use shared::SharedTree;
pub use tree::{End, Node, NodeId, Tree};
