//! Test harness for Timeloom crunching
//!
//! Provides `ScriptedBackend`, a deterministic cruncher backend: scripted
//! crunchers do nothing by themselves, the test feeds items onto their work
//! queues by hand and observes starts, retirements, liveness and profile
//! updates. This makes every manager scenario reproducible without real
//! concurrency; full-stack runs use the real thread backend instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use timeloom_crunch::{
    work_channel, Cruncher, CruncherKind, CruncherSeed, CruncherType, CrunchingProfile, WorkItem,
    WorkReceiver, WorkSender,
};
use timeloom_foundation::{State, StepFunction, StepOutcome, Value};

/// Step function advancing the clock by one, payload untouched.
pub fn counting_step() -> StepFunction {
    StepFunction::new("count", |ctx| {
        StepOutcome::Next(State::new(ctx.state.clock + 1.0, ctx.state.data.clone()))
    })
}

/// Step function that ends the simulation once the clock reaches `end_at`.
pub fn ending_step(end_at: f64) -> StepFunction {
    StepFunction::new("count_until", move |ctx| {
        if ctx.state.clock >= end_at {
            StepOutcome::End
        } else {
            StepOutcome::Next(State::new(ctx.state.clock + 1.0, ctx.state.data.clone()))
        }
    })
}

/// Shared control block for one scripted cruncher.
struct Control {
    seed: CruncherSeed,
    feed: WorkSender,
    started: AtomicBool,
    retired: AtomicBool,
    alive: AtomicBool,
    updates: Mutex<Vec<CrunchingProfile>>,
}

/// Handle a test holds onto one spawned scripted cruncher.
#[derive(Clone)]
pub struct ScriptedHandle {
    control: Arc<Control>,
}

impl ScriptedHandle {
    /// Push an item onto the cruncher's work queue.
    ///
    /// # Panics
    ///
    /// Panics if the manager side of the queue is gone.
    pub fn feed(&self, item: WorkItem) {
        self.control.feed.send(item).expect("work queue closed");
    }

    /// Push a produced state with the given clock.
    pub fn feed_state(&self, clock: f64) {
        self.feed(WorkItem::State(State::new(clock, Value::default())));
    }

    /// Simulate the worker dying on its own.
    pub fn kill(&self) {
        self.control.alive.store(false, Ordering::SeqCst);
    }

    pub fn was_started(&self) -> bool {
        self.control.started.load(Ordering::SeqCst)
    }

    pub fn was_retired(&self) -> bool {
        self.control.retired.load(Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        self.control.alive.load(Ordering::SeqCst)
    }

    /// The seed the cruncher was built from.
    pub fn seed(&self) -> &CruncherSeed {
        &self.control.seed
    }

    /// Every crunching profile pushed to this cruncher so far.
    pub fn updates(&self) -> Vec<CrunchingProfile> {
        self.control
            .updates
            .lock()
            .expect("updates mutex poisoned")
            .clone()
    }
}

/// A cruncher backend whose workers are driven by the test.
pub struct ScriptedBackend {
    kind: CruncherKind,
    spawned: Arc<Mutex<Vec<ScriptedHandle>>>,
}

impl ScriptedBackend {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: CruncherKind::from(kind),
            spawned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The backend descriptor to hand to a simpack.
    pub fn cruncher_type(&self) -> CruncherType {
        let kind = self.kind.clone();
        let spawned = Arc::clone(&self.spawned);
        CruncherType::new(kind.clone(), move |seed| {
            let (feed, work) = work_channel();
            let control = Arc::new(Control {
                seed,
                feed,
                started: AtomicBool::new(false),
                retired: AtomicBool::new(false),
                alive: AtomicBool::new(true),
                updates: Mutex::new(Vec::new()),
            });
            spawned
                .lock()
                .expect("spawn registry poisoned")
                .push(ScriptedHandle {
                    control: Arc::clone(&control),
                });
            Box::new(ScriptedCruncher {
                kind: kind.clone(),
                control,
                work,
            })
        })
    }

    /// How many crunchers this backend has built so far.
    pub fn spawned_count(&self) -> usize {
        self.spawned.lock().expect("spawn registry poisoned").len()
    }

    /// Handle to the `index`-th spawned cruncher.
    pub fn handle(&self, index: usize) -> ScriptedHandle {
        self.spawned.lock().expect("spawn registry poisoned")[index].clone()
    }

    /// Handle to the most recently spawned cruncher.
    pub fn last_handle(&self) -> ScriptedHandle {
        self.spawned
            .lock()
            .expect("spawn registry poisoned")
            .last()
            .expect("no cruncher spawned yet")
            .clone()
    }
}

struct ScriptedCruncher {
    kind: CruncherKind,
    control: Arc<Control>,
    work: WorkReceiver,
}

impl Cruncher for ScriptedCruncher {
    fn kind(&self) -> CruncherKind {
        self.kind.clone()
    }

    fn start(&mut self) {
        self.control.started.store(true, Ordering::SeqCst);
    }

    fn retire(&mut self) {
        self.control.retired.store(true, Ordering::SeqCst);
        self.control.alive.store(false, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        self.control.alive.load(Ordering::SeqCst)
    }

    fn update_crunching_profile(&mut self, profile: CrunchingProfile) {
        self.control
            .updates
            .lock()
            .expect("updates mutex poisoned")
            .push(profile);
    }

    fn work_queue(&self) -> &WorkReceiver {
        &self.work
    }
}
