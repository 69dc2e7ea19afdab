//! The crunching manager
//!
//! Coordinates background crunching for one project: decides which jobs
//! need a worker, creates and retires crunchers, drains their work queues
//! into the history tree, and reacts to profile and backend changes without
//! losing work or corrupting tree structure.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, trace};

use timeloom_foundation::{ChangeTracker, StepProfile};
use timeloom_tree::{NodeId, SharedTree, Tree};

use crate::cruncher::{Cruncher, CruncherSeed, CruncherType};
use crate::error::{Error, Result};
use crate::job::{self, JobHandle, JobId};
use crate::queue::WorkItem;
use crate::simpack::Simpack;

/// A job's active worker, with the step profile currently in effect for it.
///
/// The step profile is tracked here, not read off the job, because a
/// running cruncher cannot change step profiles: until it is replaced (or
/// announces a change itself), its output is tagged with the profile it was
/// started with.
struct CruncherEntry {
    job: JobHandle,
    cruncher: Box<dyn Cruncher>,
    step_profile: StepProfile,
}

/// What to do about a job's assigned cruncher, decided once per job per
/// sync. Variants are listed in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// The job is complete: drop it and retire the cruncher.
    Finish,
    /// The cruncher died on its own, or the selected backend changed out
    /// from under it.
    ReplaceForType,
    /// The step profile changed; a running cruncher cannot follow, so it is
    /// replaced.
    ReplaceForProfile,
    /// The crunching profile changed in some other way (clock target);
    /// pushed to the live cruncher in place.
    UpdateProfile,
    /// Leave it running.
    Keep,
}

/// Coordinates the background crunching for a project.
///
/// Owns the job list and the job-to-cruncher map. `sync_crunchers` is the
/// single entry point, meant to be called repeatedly by the project's
/// driving loop; everything else is owner-side bookkeeping.
pub struct CrunchingManager {
    tree: Arc<SharedTree>,
    simpack: Arc<Simpack>,
    jobs: Vec<JobHandle>,
    crunchers: IndexMap<JobId, CruncherEntry>,
    /// Tracks crunching-profile revisions per job between syncs
    change_tracker: ChangeTracker<JobId>,
    cruncher_type: CruncherType,
}

impl fmt::Debug for CrunchingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrunchingManager")
            .field("simpack", &self.simpack.name())
            .field("jobs", &self.jobs.len())
            .field("crunchers", &self.crunchers.len())
            .finish_non_exhaustive()
    }
}

impl CrunchingManager {
    /// Create a manager for the given simpack and tree.
    ///
    /// Selects the first backend the simpack declares; a simpack declaring
    /// none is a configuration error.
    pub fn new(simpack: Arc<Simpack>, tree: Arc<SharedTree>) -> Result<Self> {
        let cruncher_type = simpack
            .available_cruncher_types()
            .first()
            .cloned()
            .ok_or_else(|| Error::NoCruncherTypes {
                simpack: simpack.name().to_string(),
            })?;
        info!(
            simpack = simpack.name(),
            backend = %cruncher_type.kind(),
            "crunching manager created"
        );
        Ok(Self {
            tree,
            simpack,
            jobs: Vec::new(),
            crunchers: IndexMap::new(),
            change_tracker: ChangeTracker::new(),
            cruncher_type,
        })
    }

    /// The simpack this manager crunches for.
    pub fn simpack(&self) -> &Simpack {
        &self.simpack
    }

    /// The currently selected worker backend.
    pub fn cruncher_type(&self) -> &CruncherType {
        &self.cruncher_type
    }

    /// Select a different worker backend. Running crunchers of the old type
    /// are replaced on the next sync, after their queued work is merged.
    pub fn set_cruncher_type(&mut self, cruncher_type: CruncherType) {
        if cruncher_type != self.cruncher_type {
            info!(
                from = %self.cruncher_type.kind(),
                to = %cruncher_type.kind(),
                "cruncher backend switched"
            );
            self.cruncher_type = cruncher_type;
        }
    }

    /// Put a job on the live list.
    pub fn add_job(&mut self, job: JobHandle) {
        debug!(job = %job::lock_job(&job).id(), "job added");
        self.jobs.push(job);
    }

    /// Cancel a job: remove it from the live list. Its cruncher (if any) is
    /// reaped on the next sync, with queued work merged first.
    pub fn cancel_job(&mut self, id: JobId) -> Result<()> {
        let before = self.jobs.len();
        self.jobs.retain(|job| job::lock_job(job).id() != id);
        if self.jobs.len() == before {
            return Err(Error::JobNotFound(id));
        }
        debug!(job = %id, "job cancelled");
        Ok(())
    }

    /// The live job list.
    pub fn jobs(&self) -> &[JobHandle] {
        &self.jobs
    }

    /// Every live job currently pointing at `node`.
    pub fn jobs_by_node(&self, node: NodeId) -> Vec<JobHandle> {
        self.jobs
            .iter()
            .filter(|job| job::lock_job(job).node == node)
            .cloned()
            .collect()
    }

    /// Number of tracked crunchers. May momentarily include workers that
    /// died since the last sync.
    pub fn cruncher_count(&self) -> usize {
        self.crunchers.len()
    }

    /// Take work from the crunchers and give them new instructions.
    ///
    /// Drains every work queue into the tree, retires and recruits
    /// crunchers as needed, and drops completed jobs. Holds the tree's
    /// write lock for its whole duration. Returns the number of nodes
    /// added to the tree.
    pub fn sync_crunchers(&mut self) -> Result<usize> {
        let tree_handle = Arc::clone(&self.tree);
        let mut tree = tree_handle.write();
        let mut total_added = 0usize;

        // First pass: reap crunchers whose jobs were cancelled, merging any
        // work they already produced. After this, every tracked cruncher
        // has a live job.
        let live: HashSet<JobId> = self.jobs.iter().map(|job| job::lock_job(job).id()).collect();
        let orphaned: Vec<JobId> = self
            .crunchers
            .keys()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        for id in orphaned {
            if let Some(mut entry) = self.crunchers.shift_remove(&id) {
                debug!(job = %id, "reaping cruncher of cancelled job");
                let mut job = job::lock_job(&entry.job);
                let (added, _leaf) = drain_into_tree(
                    &mut tree,
                    &mut job,
                    entry.cruncher.as_mut(),
                    &mut entry.step_profile,
                    true,
                )?;
                total_added += added;
                drop(job);
                self.change_tracker.forget(&id);
            }
        }

        // Second pass: reconcile every live job, in job-list order.
        let jobs_snapshot: Vec<JobHandle> = self.jobs.clone();
        for job_handle in jobs_snapshot {
            let job_id = job::lock_job(&job_handle).id();

            if !self.crunchers.contains_key(&job_id) {
                // No cruncher yet. Done jobs are dropped; the rest get a
                // worker, unless their node is being edited.
                let done = job::lock_job(&job_handle).is_done(&tree);
                if done {
                    self.remove_job(job_id);
                } else {
                    self.conditional_create_cruncher(&tree, &job_handle)?;
                }
                continue;
            }

            // Active job with an assigned cruncher: merge its work, move
            // the job to the new leaf, then decide what to do with it.
            let verdict;
            {
                let entry = self
                    .crunchers
                    .get_mut(&job_id)
                    .expect("cruncher entry vanished");
                let mut job = job::lock_job(&job_handle);
                let (added, new_leaf) = drain_into_tree(
                    &mut tree,
                    &mut job,
                    entry.cruncher.as_mut(),
                    &mut entry.step_profile,
                    false,
                )?;
                total_added += added;
                job.node = new_leaf;

                verdict = if job.is_done(&tree) {
                    Verdict::Finish
                } else if !entry.cruncher.is_alive()
                    || entry.cruncher.kind() != *self.cruncher_type.kind()
                {
                    Verdict::ReplaceForType
                } else if *job.crunching_profile.step_profile() != entry.step_profile {
                    Verdict::ReplaceForProfile
                } else if self
                    .change_tracker
                    .check_in(job_id, job.crunching_profile.revision())
                {
                    Verdict::UpdateProfile
                } else {
                    Verdict::Keep
                };
            }
            trace!(job = %job_id, ?verdict, "job reconciled");

            match verdict {
                Verdict::Finish => {
                    if let Some(mut entry) = self.crunchers.shift_remove(&job_id) {
                        if entry.cruncher.is_alive() {
                            entry.cruncher.retire();
                        }
                    }
                    self.remove_job(job_id);
                    debug!(job = %job_id, "job finished");
                }
                Verdict::ReplaceForType => {
                    if let Some(mut entry) = self.crunchers.shift_remove(&job_id) {
                        // Retire even if it already died on its own.
                        entry.cruncher.retire();
                    }
                    debug!(job = %job_id, "cruncher dead or of the wrong backend; replacing");
                    self.conditional_create_cruncher(&tree, &job_handle)?;
                }
                Verdict::ReplaceForProfile => {
                    if let Some(mut entry) = self.crunchers.shift_remove(&job_id) {
                        if entry.cruncher.is_alive() {
                            entry.cruncher.retire();
                        }
                    }
                    debug!(job = %job_id, "step profile changed; replacing cruncher");
                    self.conditional_create_cruncher(&tree, &job_handle)?;
                }
                Verdict::UpdateProfile => {
                    let entry = self
                        .crunchers
                        .get_mut(&job_id)
                        .expect("cruncher entry vanished");
                    let profile = job::lock_job(&job_handle).crunching_profile.clone();
                    entry.cruncher.update_crunching_profile(profile);
                    trace!(job = %job_id, "crunching profile pushed to live cruncher");
                }
                Verdict::Keep => {}
            }
        }

        trace!(added = total_added, "sync complete");
        Ok(total_added)
    }

    /// Create a cruncher for a job, unless its node is in editing, in which
    /// case the job silently waits for a later sync.
    fn conditional_create_cruncher(&mut self, tree: &Tree, job_handle: &JobHandle) -> Result<()> {
        let job = job::lock_job(job_handle);
        let node = tree.node(job.node)?;
        if node.still_in_editing {
            trace!(job = %job.id(), node = %job.node, "node in editing; not crunching");
            return Ok(());
        }

        let seed = CruncherSeed {
            state: node.state.clone(),
            profile: job.crunching_profile.clone(),
        };
        let mut cruncher = self.cruncher_type.build(seed);
        cruncher.start();
        debug!(
            job = %job.id(),
            node = %job.node,
            backend = %self.cruncher_type.kind(),
            "cruncher recruited"
        );

        self.change_tracker
            .check_in(job.id(), job.crunching_profile.revision());
        let step_profile = job.crunching_profile.step_profile().clone();
        let job_id = job.id();
        drop(job);
        self.crunchers.insert(
            job_id,
            CruncherEntry {
                job: Arc::clone(job_handle),
                cruncher,
                step_profile,
            },
        );
        Ok(())
    }

    /// Drop a job from the live list and stop tracking its profile.
    fn remove_job(&mut self, id: JobId) {
        self.jobs.retain(|job| job::lock_job(job).id() != id);
        self.change_tracker.forget(&id);
    }
}

impl fmt::Display for CrunchingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CrunchingManager employing {} crunchers to handle {} jobs",
            self.crunchers.len(),
            self.jobs.len()
        )
    }
}

/// Merge everything currently on a cruncher's work queue into the tree.
///
/// Non-blocking: only items already produced are consumed; this never waits
/// for more. States are appended under `step_profile` (which a
/// step-profile-change item swaps out mid-drain); an end marker caps the
/// branch and forces retirement regardless of `retire`. Returns the number
/// of nodes added and the new leaf.
fn drain_into_tree(
    tree: &mut Tree,
    job: &mut job::Job,
    cruncher: &mut dyn Cruncher,
    step_profile: &mut StepProfile,
    retire: bool,
) -> Result<(usize, NodeId)> {
    let mut current = job.node;
    let mut added = 0usize;
    let mut ended = false;

    for item in cruncher.work_queue().try_iter() {
        if ended {
            return Err(Error::UnexpectedQueueItem { kind: item.kind() });
        }
        match item {
            WorkItem::State(state) => {
                current = tree.add_state(state, current, step_profile.clone())?;
                added += 1;
            }
            WorkItem::End => {
                tree.make_end(current, step_profile.clone())?;
                job.resulted_in_end = true;
                ended = true;
            }
            WorkItem::StepProfileChange(profile) => {
                trace!(job = %job.id(), "cruncher switched step profile");
                *step_profile = profile;
            }
        }
    }

    if retire || job.resulted_in_end {
        cruncher.retire();
    }

    Ok((added, current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use timeloom_foundation::{State, StepFunction, StepOutcome, Value};

    use crate::job::Job;
    use crate::profile::CrunchingProfile;

    fn counting_simpack() -> Simpack {
        let step = StepFunction::new("count", |ctx| {
            StepOutcome::Next(State::new(ctx.state.clock + 1.0, ctx.state.data.clone()))
        });
        Simpack::new("counting").with_default_step_function(step)
    }

    #[test]
    fn test_simpack_without_backends_is_a_configuration_error() {
        let simpack = Arc::new(counting_simpack().with_cruncher_types(vec![]));
        let tree = Arc::new(SharedTree::default());

        let result = CrunchingManager::new(simpack, tree);
        assert_matches!(
            result,
            Err(Error::NoCruncherTypes { simpack }) if simpack == "counting"
        );
    }

    #[test]
    fn test_selects_first_declared_backend() {
        let simpack = Arc::new(counting_simpack());
        let tree = Arc::new(SharedTree::default());

        let manager = CrunchingManager::new(simpack, tree).unwrap();
        assert_eq!(manager.cruncher_type().kind().0, "thread");
    }

    #[test]
    fn test_cancel_unknown_job_is_an_error() {
        let simpack = Arc::new(counting_simpack());
        let tree = Arc::new(SharedTree::default());
        let mut manager = CrunchingManager::new(simpack, tree.clone()).unwrap();

        let root = tree.write().add_root(State::initial(Value::default()));
        let pack = counting_simpack();
        let step = pack.default_step_function().unwrap().clone();
        let job = Job::new(root, CrunchingProfile::new(5.0, StepProfile::bare(step))).into_handle();
        let id = job::lock_job(&job).id();

        assert_matches!(
            manager.cancel_job(id),
            Err(Error::JobNotFound(unknown)) if unknown == id
        );

        manager.add_job(job);
        manager.cancel_job(id).unwrap();
        assert!(manager.jobs().is_empty());
    }

    #[test]
    fn test_jobs_by_node() {
        let simpack = Arc::new(counting_simpack());
        let tree = Arc::new(SharedTree::default());
        let mut manager = CrunchingManager::new(simpack.clone(), tree.clone()).unwrap();

        let root = tree.write().add_root(State::initial(Value::default()));
        let other = tree.write().add_root(State::initial(Value::default()));
        let step = simpack.default_step_function().unwrap().clone();
        let profile = CrunchingProfile::new(5.0, StepProfile::bare(step));

        let a = Job::new(root, profile.clone()).into_handle();
        let b = Job::new(root, profile.clone()).into_handle();
        let c = Job::new(other, profile).into_handle();
        manager.add_job(a.clone());
        manager.add_job(b.clone());
        manager.add_job(c);

        let found = manager.jobs_by_node(root);
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|j| Arc::ptr_eq(j, &a)));
        assert!(found.iter().any(|j| Arc::ptr_eq(j, &b)));
    }
}
