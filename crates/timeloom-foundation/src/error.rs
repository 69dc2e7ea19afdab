//! Foundation errors

use thiserror::Error;

/// Foundation result type
pub type Result<T> = std::result::Result<T, Error>;

/// Foundation errors
#[derive(Debug, Error)]
pub enum Error {
    /// No step function was given and there is no default to fall back on.
    #[error("no step function given and no default step function available")]
    MissingStepFunction,
}
