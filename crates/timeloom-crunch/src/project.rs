//! Projects
//!
//! A project bundles a simpack, its history tree, and the crunching manager
//! working for it. This is the owner-side surface: seed a root, ask for
//! crunching, call sync from a driving loop.

use std::sync::Arc;

use timeloom_foundation::{State, StepProfileInput};
use timeloom_tree::{NodeId, SharedTree};

use crate::error::Result;
use crate::job::{Job, JobHandle};
use crate::manager::CrunchingManager;
use crate::profile::CrunchingProfile;
use crate::simpack::Simpack;

/// A simulation project: one simpack, one tree, one crunching manager.
pub struct Project {
    simpack: Arc<Simpack>,
    tree: Arc<SharedTree>,
    /// The manager crunching this project's tree
    pub crunching_manager: CrunchingManager,
}

impl Project {
    pub fn new(simpack: Simpack) -> Result<Self> {
        let simpack = Arc::new(simpack);
        let tree = Arc::new(SharedTree::default());
        let crunching_manager = CrunchingManager::new(Arc::clone(&simpack), Arc::clone(&tree))?;
        Ok(Self {
            simpack,
            tree,
            crunching_manager,
        })
    }

    pub fn simpack(&self) -> &Simpack {
        &self.simpack
    }

    pub fn tree(&self) -> &Arc<SharedTree> {
        &self.tree
    }

    /// Seed the tree with a root state.
    pub fn root_state(&self, state: State) -> NodeId {
        self.tree.write().add_root(state)
    }

    /// Request crunching from `node` up to `clock_target` with the
    /// simpack's default step function.
    pub fn begin_crunching(&mut self, node: NodeId, clock_target: f64) -> Result<JobHandle> {
        let step_profile = self
            .simpack
            .step_profile_parser()
            .parse(StepProfileInput::Arguments {
                args: vec![],
                kwargs: Default::default(),
            })?;
        Ok(self.begin_crunching_with_profile(node, CrunchingProfile::new(clock_target, step_profile)))
    }

    /// Request crunching from `node` with an explicit crunching profile.
    pub fn begin_crunching_with_profile(
        &mut self,
        node: NodeId,
        profile: CrunchingProfile,
    ) -> JobHandle {
        let handle = Job::new(node, profile).into_handle();
        self.crunching_manager.add_job(Arc::clone(&handle));
        handle
    }

    /// Sync the crunching manager once. See
    /// [`CrunchingManager::sync_crunchers`].
    pub fn sync_crunchers(&mut self) -> Result<usize> {
        self.crunching_manager.sync_crunchers()
    }
}
