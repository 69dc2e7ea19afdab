//! Thread-backed cruncher
//!
//! Runs the step loop on a dedicated OS thread. Orders (retire, profile
//! updates) arrive on a channel polled between steps; produced states go
//! out on the work queue. Once its crunching profile is satisfied the
//! thread parks on the order channel instead of spinning.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::trace;

use timeloom_foundation::{State, StepOutcome};

use crate::cruncher::{Cruncher, CruncherKind, CruncherSeed, CruncherType};
use crate::profile::CrunchingProfile;
use crate::queue::{work_channel, WorkItem, WorkReceiver, WorkSender};

/// Orders the manager side sends to the crunching thread.
enum Order {
    Retire,
    Update(CrunchingProfile),
}

/// Pieces handed to the worker thread when the cruncher starts.
struct Unstarted {
    state: State,
    profile: CrunchingProfile,
    orders: Receiver<Order>,
    work: WorkSender,
}

/// An OS-thread cruncher backend.
pub struct ThreadCruncher {
    orders: Sender<Order>,
    work: WorkReceiver,
    unstarted: Option<Unstarted>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadCruncher {
    pub const KIND: &'static str = "thread";

    pub fn new(seed: CruncherSeed) -> Self {
        let (order_tx, order_rx) = unbounded();
        let (work_tx, work_rx) = work_channel();
        Self {
            orders: order_tx,
            work: work_rx,
            unstarted: Some(Unstarted {
                state: seed.state,
                profile: seed.profile,
                orders: order_rx,
                work: work_tx,
            }),
            handle: None,
        }
    }

    /// The backend descriptor for thread crunchers.
    pub fn cruncher_type() -> CruncherType {
        CruncherType::new(Self::KIND, |seed| Box::new(ThreadCruncher::new(seed)))
    }
}

impl Cruncher for ThreadCruncher {
    fn kind(&self) -> CruncherKind {
        CruncherKind::from(Self::KIND)
    }

    fn start(&mut self) {
        if let Some(parts) = self.unstarted.take() {
            let worker = CrunchLoop {
                state: parts.state,
                profile: parts.profile,
                orders: parts.orders,
                work: parts.work,
            };
            self.handle = Some(thread::spawn(move || worker.run()));
        }
    }

    fn retire(&mut self) {
        // Send failure means the thread already exited; nothing to do.
        let _ = self.orders.send(Order::Retire);
    }

    fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn update_crunching_profile(&mut self, profile: CrunchingProfile) {
        let _ = self.orders.send(Order::Update(profile));
    }

    fn work_queue(&self) -> &WorkReceiver {
        &self.work
    }
}

/// The step loop running on the worker thread.
struct CrunchLoop {
    state: State,
    profile: CrunchingProfile,
    orders: Receiver<Order>,
    work: WorkSender,
}

impl CrunchLoop {
    fn run(mut self) {
        trace!(clock = self.state.clock, "cruncher thread started");
        loop {
            // Apply orders that arrived since the last step.
            loop {
                match self.orders.try_recv() {
                    Ok(Order::Retire) => return,
                    Ok(Order::Update(profile)) => self.adopt(profile),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            if self.profile.state_satisfies(&self.state) {
                // Target reached; wait for new orders instead of spinning.
                match self.orders.recv() {
                    Ok(Order::Retire) | Err(_) => return,
                    Ok(Order::Update(profile)) => {
                        self.adopt(profile);
                        continue;
                    }
                }
            }

            match self.profile.step_profile().step(&self.state) {
                StepOutcome::Next(state) => {
                    if self.work.send(WorkItem::State(state.clone())).is_err() {
                        // Manager dropped the queue; nobody is listening.
                        return;
                    }
                    self.state = state;
                }
                StepOutcome::End => {
                    let _ = self.work.send(WorkItem::End);
                    trace!(clock = self.state.clock, "simulation ended");
                    return;
                }
            }
        }
    }

    /// Adopt an updated crunching profile, announcing a step-profile change
    /// on the work queue first so subsequent states are tagged correctly.
    fn adopt(&mut self, profile: CrunchingProfile) {
        if profile.step_profile() != self.profile.step_profile() {
            let _ = self
                .work
                .send(WorkItem::StepProfileChange(profile.step_profile().clone()));
        }
        self.profile = profile;
    }
}
