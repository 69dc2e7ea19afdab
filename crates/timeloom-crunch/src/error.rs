//! Crunching errors

use thiserror::Error;

use crate::job::JobId;

/// Crunching result type
pub type Result<T> = std::result::Result<T, Error>;

/// Crunching errors
#[derive(Debug, Error)]
pub enum Error {
    /// The simpack declares no worker backend the manager could use.
    #[error("simpack `{simpack}` declares no usable cruncher type")]
    NoCruncherTypes { simpack: String },

    /// A cruncher kept talking after signalling the end of its simulation.
    /// The queue contract is closed: nothing may follow an end marker.
    #[error("unexpected {kind} item on a work queue after an end marker")]
    UnexpectedQueueItem { kind: &'static str },

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error(transparent)]
    Tree(#[from] timeloom_tree::Error),

    #[error(transparent)]
    Foundation(#[from] timeloom_foundation::Error),
}
