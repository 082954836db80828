//! Task records shared by the coordinator and the workers.

use std::fmt;

/// Task id, unique within its phase.
pub type TaskId = u32;

/// Opaque worker identifier. Advisory only.
pub type WorkerId = String;

/// Which user function a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => write!(f, "map"),
            TaskKind::Reduce => write!(f, "reduce"),
        }
    }
}

/// Per-task state, owned by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Idle,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Idle => write!(f, "idle"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Job-wide stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Only map tasks may be dispatched.
    Map,

    /// Every map task completed; only reduce tasks may be dispatched.
    Reduce,

    /// Every reduce task completed.
    Done,

    /// A task exhausted its attempts. Terminal.
    Failed,
}

impl Phase {
    /// The kind of task dispatched in this phase, if any.
    pub fn task_kind(self) -> Option<TaskKind> {
        match self {
            Phase::Map => Some(TaskKind::Map),
            Phase::Reduce => Some(TaskKind::Reduce),
            Phase::Done | Phase::Failed => None,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Map => write!(f, "map"),
            Phase::Reduce => write!(f, "reduce"),
            Phase::Done => write!(f, "done"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// A byte range of one input file. Unless cut out of an oversized line, it
/// starts at the beginning of a line and ends just after a newline or at
/// the end of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSplit {
    pub path: String,
    pub offset: u64,
    pub len: u64,
}

/// Everything a worker needs to execute one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub kind: TaskKind,

    /// Input segments of the split. Empty for reduce tasks, which read
    /// `mr-*-<id>` from `work_dir`.
    pub inputs: Vec<InputSplit>,

    /// Number of map tasks, i.e. intermediate files per partition.
    pub n_map: u32,

    /// Number of partitions each map task writes.
    pub n_reduce: u32,

    /// Directory holding intermediate files.
    pub work_dir: String,

    /// Directory reduce outputs are written to.
    pub output_dir: String,

    /// Name of the workload, for workers that resolve it themselves.
    pub workload: String,

    /// Auxiliary arguments to pass to the MapReduce application.
    pub aux: Vec<String>,
}

/// Answer to a worker asking for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Run this task.
    Assigned(TaskDescriptor),

    /// Nothing to hand out right now; ask again shortly.
    Retry,

    /// The job is finished; stop.
    Exit,
}
