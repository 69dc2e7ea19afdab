//! Crunching jobs
//!
//! A job pairs a tree node (the crunching starting point) with a crunching
//! profile. The manager advances the node as work is merged and drops the
//! job once it is done.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use timeloom_tree::{NodeId, Tree};

use crate::profile::CrunchingProfile;

/// Unique identifier for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of requested crunching: a starting node and how far to go.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    /// The node crunching continues from; advanced by the manager as work
    /// is merged into the tree, never by anything else
    pub node: NodeId,
    /// How far and how to crunch; mutated in place by the job's owner
    pub crunching_profile: CrunchingProfile,
    /// Set when the job's cruncher signalled the end of the simulation
    pub resulted_in_end: bool,
}

impl Job {
    pub fn new(node: NodeId, crunching_profile: CrunchingProfile) -> Self {
        Self {
            id: JobId::next(),
            node,
            crunching_profile,
            resulted_in_end: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Whether there is nothing left to crunch: the simulation ended, or
    /// the job's node has reached the clock target.
    pub fn is_done(&self, tree: &Tree) -> bool {
        self.resulted_in_end
            || tree
                .node(self.node)
                .is_ok_and(|node| self.crunching_profile.state_satisfies(&node.state))
    }

    pub fn into_handle(self) -> JobHandle {
        Arc::new(Mutex::new(self))
    }
}

/// Shared handle to a job; the owner and the manager both hold one.
pub type JobHandle = Arc<Mutex<Job>>;

/// Lock a job handle. Contention is impossible by contract (owners mutate
/// jobs between syncs, not during them), so poisoning is fatal.
pub(crate) fn lock_job(handle: &JobHandle) -> MutexGuard<'_, Job> {
    handle.lock().expect("job mutex poisoned - fatal error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeloom_foundation::{State, StepFunction, StepOutcome, StepProfile, Value};

    fn profile(clock_target: f64) -> CrunchingProfile {
        let step = StepFunction::new("noop", |ctx| StepOutcome::Next(ctx.state.clone()));
        CrunchingProfile::new(clock_target, StepProfile::bare(step))
    }

    #[test]
    fn test_done_when_node_reaches_target() {
        let mut tree = Tree::new();
        let root = tree.add_root(State::new(5.0, Value::default()));

        let job = Job::new(root, profile(5.0));
        assert!(job.is_done(&tree));

        let job = Job::new(root, profile(6.0));
        assert!(!job.is_done(&tree));
    }

    #[test]
    fn test_done_when_resulted_in_end() {
        let mut tree = Tree::new();
        let root = tree.add_root(State::initial(Value::default()));

        let mut job = Job::new(root, profile(f64::INFINITY));
        assert!(!job.is_done(&tree));
        job.resulted_in_end = true;
        assert!(job.is_done(&tree));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut tree = Tree::new();
        let root = tree.add_root(State::initial(Value::default()));
        let a = Job::new(root, profile(1.0));
        let b = Job::new(root, profile(1.0));
        assert_ne!(a.id(), b.id());
    }
}
