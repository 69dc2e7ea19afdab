//! The cruncher-to-manager work queue
//!
//! A single-producer single-consumer stream of crunching output. The item
//! contract is closed: states, at most one trailing end marker, and
//! step-profile change announcements - nothing else, and nothing after the
//! end marker.

use crossbeam_channel::{unbounded, Receiver, Sender};

use timeloom_foundation::{State, StepProfile};

/// An item a cruncher pushes onto its work queue.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A freshly crunched state
    State(State),
    /// The simulation reached a terminal moment; nothing may follow
    End,
    /// States from here on were produced with this step profile
    StepProfileChange(StepProfile),
}

impl WorkItem {
    /// Item kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkItem::State(_) => "state",
            WorkItem::End => "end",
            WorkItem::StepProfileChange(_) => "step-profile-change",
        }
    }
}

/// Sending half of a cruncher's work queue.
pub type WorkSender = Sender<WorkItem>;

/// Receiving half of a cruncher's work queue.
pub type WorkReceiver = Receiver<WorkItem>;

/// Create the work queue pair for one cruncher.
pub fn work_channel() -> (WorkSender, WorkReceiver) {
    unbounded()
}
