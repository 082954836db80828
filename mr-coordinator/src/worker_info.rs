use std::fmt;
use std::time::Instant;

use common::task::TaskKind;

#[derive(Debug, Clone, PartialEq, Copy)]
pub enum WorkerState {
    Free,
    Mapping,
    Reducing,
}

impl WorkerState {
    pub fn from_task_kind(kind: TaskKind) -> WorkerState {
        match kind {
            TaskKind::Map => WorkerState::Mapping,
            TaskKind::Reduce => WorkerState::Reducing,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Free => write!(f, "free"),
            WorkerState::Mapping => write!(f, "mapping"),
            WorkerState::Reducing => write!(f, "reducing"),
        }
    }
}

/// What the coordinator knows about a worker. Diagnostics only: the task
/// table, not this record, decides who may complete what.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// The state of the worker, as last observed.
    pub state: WorkerState,

    /// When the worker last talked to the coordinator.
    pub last_seen: Instant,

    /// Completion reports from this worker that were accepted.
    pub tasks_completed: u32,
}

impl WorkerInfo {
    pub fn new(now: Instant) -> Self {
        Self {
            state: WorkerState::Free, // By default, workers start off free.
            last_seen: now,
            tasks_completed: 0,
        }
    }

    /// Set worker state.
    pub fn set_state(&mut self, new_state: WorkerState) {
        self.state = new_state;
    }
}
