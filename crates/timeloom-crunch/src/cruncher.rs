//! Cruncher backends
//!
//! A cruncher is a background worker bound to one job. The manager only
//! ever sees the `Cruncher` trait: it starts a cruncher, retires it, polls
//! its liveness, pushes crunching-profile updates, and drains its work
//! queue. Backends (thread-backed, process-backed, remote) all look the
//! same from here.

use std::fmt;
use std::sync::Arc;

use timeloom_foundation::State;

use crate::profile::CrunchingProfile;
use crate::queue::WorkReceiver;

/// Names a cruncher backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CruncherKind(pub String);

impl fmt::Display for CruncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CruncherKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CruncherKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What a cruncher is born from: the state to continue from and the profile
/// to crunch with.
#[derive(Debug, Clone)]
pub struct CruncherSeed {
    pub state: State,
    pub profile: CrunchingProfile,
}

/// A background worker crunching one job.
///
/// Implementations run on their own scheduling substrate and communicate
/// only through their work queue; they never touch the tree. Retirement is
/// cooperative: `retire` asks the worker to stop and must be a no-op on a
/// worker that already died.
pub trait Cruncher: Send {
    /// The backend this cruncher was built by.
    fn kind(&self) -> CruncherKind;

    /// Begin crunching. Called exactly once, before any other operation.
    fn start(&mut self);

    /// Ask the cruncher to stop.
    fn retire(&mut self);

    /// Whether the worker is still running.
    fn is_alive(&self) -> bool;

    /// Push an updated crunching profile to a live cruncher. The manager
    /// only uses this for changes that keep the step profile; a cruncher
    /// whose step profile must change is replaced instead.
    fn update_crunching_profile(&mut self, profile: CrunchingProfile);

    /// The queue this cruncher pushes its output onto.
    fn work_queue(&self) -> &WorkReceiver;
}

/// A runtime-selectable cruncher backend: a kind plus a factory.
///
/// Equality is by kind; the manager compares a running cruncher's kind
/// against the selected type to notice backend switches.
#[derive(Clone)]
pub struct CruncherType {
    kind: CruncherKind,
    build: Arc<dyn Fn(CruncherSeed) -> Box<dyn Cruncher> + Send + Sync>,
}

impl CruncherType {
    pub fn new(
        kind: impl Into<CruncherKind>,
        build: impl Fn(CruncherSeed) -> Box<dyn Cruncher> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: kind.into(),
            build: Arc::new(build),
        }
    }

    pub fn kind(&self) -> &CruncherKind {
        &self.kind
    }

    /// Build (but do not start) a cruncher from `seed`.
    pub fn build(&self, seed: CruncherSeed) -> Box<dyn Cruncher> {
        (self.build)(seed)
    }
}

impl PartialEq for CruncherType {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for CruncherType {}

impl fmt::Debug for CruncherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CruncherType").field(&self.kind).finish()
    }
}
