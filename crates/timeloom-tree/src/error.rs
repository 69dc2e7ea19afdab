//! Tree errors

use thiserror::Error;

use crate::tree::NodeId;

/// Tree result type
pub type Result<T> = std::result::Result<T, Error>;

/// Tree errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}
