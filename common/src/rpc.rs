//! gRPC messages of the `mapreduce.Coordinator` service.
//!
//! The service stubs are generated by `build.rs`; the messages are plain
//! prost structs, declared by hand.
//! NOTE: field tags are part of the wire format. Never renumber them.

use anyhow::anyhow;

use crate::task::{Assignment, InputSplit, TaskDescriptor, TaskKind};

include!(concat!(env!("OUT_DIR"), "/mapreduce.Coordinator.rs"));

pub use coordinator_client::CoordinatorClient;
pub use coordinator_server::{Coordinator, CoordinatorServer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WireTaskKind {
    Map = 0,
    Reduce = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ReplyKind {
    Retry = 0,
    Assigned = 1,
    Exit = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskRequest {
    #[prost(string, tag = "1")]
    pub worker_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireInput {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(uint64, tag = "2")]
    pub offset: u64,
    #[prost(uint64, tag = "3")]
    pub len: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireTask {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(enumeration = "WireTaskKind", tag = "2")]
    pub kind: i32,
    #[prost(message, repeated, tag = "3")]
    pub inputs: Vec<WireInput>,
    #[prost(uint32, tag = "4")]
    pub n_map: u32,
    #[prost(uint32, tag = "5")]
    pub n_reduce: u32,
    #[prost(string, tag = "6")]
    pub work_dir: String,
    #[prost(string, tag = "7")]
    pub output_dir: String,
    #[prost(string, tag = "8")]
    pub workload: String,
    #[prost(string, repeated, tag = "9")]
    pub aux: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskReply {
    #[prost(enumeration = "ReplyKind", tag = "1")]
    pub reply: i32,
    #[prost(message, optional, tag = "2")]
    pub task: Option<WireTask>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DoneReport {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(uint32, tag = "2")]
    pub task_id: u32,
    #[prost(enumeration = "WireTaskKind", tag = "3")]
    pub kind: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FailureReport {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(uint32, tag = "2")]
    pub task_id: u32,
    #[prost(enumeration = "WireTaskKind", tag = "3")]
    pub kind: i32,
    #[prost(string, tag = "4")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ack {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StatusRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskRow {
    #[prost(enumeration = "WireTaskKind", tag = "1")]
    pub kind: i32,
    #[prost(uint32, tag = "2")]
    pub id: u32,
    #[prost(string, tag = "3")]
    pub status: String,
    #[prost(string, tag = "4")]
    pub worker: String,
    #[prost(uint32, tag = "5")]
    pub attempts: u32,
    #[prost(uint32, tag = "6")]
    pub failures: u32,
    #[prost(uint64, tag = "7")]
    pub running_ms: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WorkerRow {
    #[prost(string, tag = "1")]
    pub worker_id: String,
    #[prost(string, tag = "2")]
    pub state: String,
    #[prost(uint32, tag = "3")]
    pub tasks_completed: u32,
    #[prost(uint64, tag = "4")]
    pub last_seen_ms: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StatusReply {
    #[prost(string, tag = "1")]
    pub phase: String,
    #[prost(message, repeated, tag = "2")]
    pub tasks: Vec<TaskRow>,
    #[prost(message, repeated, tag = "3")]
    pub workers: Vec<WorkerRow>,
    #[prost(string, tag = "4")]
    pub error: String,
}

/////////////////////////////////////////////////////////////////////////////
// Conversions
/////////////////////////////////////////////////////////////////////////////

impl From<TaskKind> for WireTaskKind {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Map => WireTaskKind::Map,
            TaskKind::Reduce => WireTaskKind::Reduce,
        }
    }
}

impl From<WireTaskKind> for TaskKind {
    fn from(kind: WireTaskKind) -> Self {
        match kind {
            WireTaskKind::Map => TaskKind::Map,
            WireTaskKind::Reduce => TaskKind::Reduce,
        }
    }
}

/// Decode a raw enumeration field, rejecting unknown values.
pub fn task_kind(raw: i32) -> Result<TaskKind, tonic::Status> {
    WireTaskKind::try_from(raw)
        .map(TaskKind::from)
        .map_err(|_| tonic::Status::invalid_argument(format!("unknown task kind {raw}")))
}

impl From<InputSplit> for WireInput {
    fn from(split: InputSplit) -> Self {
        Self {
            path: split.path,
            offset: split.offset,
            len: split.len,
        }
    }
}

impl From<WireInput> for InputSplit {
    fn from(input: WireInput) -> Self {
        Self {
            path: input.path,
            offset: input.offset,
            len: input.len,
        }
    }
}

impl From<TaskDescriptor> for WireTask {
    fn from(task: TaskDescriptor) -> Self {
        Self {
            id: task.id,
            kind: WireTaskKind::from(task.kind) as i32,
            inputs: task.inputs.into_iter().map(WireInput::from).collect(),
            n_map: task.n_map,
            n_reduce: task.n_reduce,
            work_dir: task.work_dir,
            output_dir: task.output_dir,
            workload: task.workload,
            aux: task.aux,
        }
    }
}

impl From<Assignment> for TaskReply {
    fn from(assignment: Assignment) -> Self {
        match assignment {
            Assignment::Assigned(task) => TaskReply {
                reply: ReplyKind::Assigned as i32,
                task: Some(task.into()),
            },
            Assignment::Retry => TaskReply {
                reply: ReplyKind::Retry as i32,
                task: None,
            },
            Assignment::Exit => TaskReply {
                reply: ReplyKind::Exit as i32,
                task: None,
            },
        }
    }
}

impl TryFrom<TaskReply> for Assignment {
    type Error = anyhow::Error;

    fn try_from(reply: TaskReply) -> anyhow::Result<Self> {
        let kind = ReplyKind::try_from(reply.reply)
            .map_err(|_| anyhow!("unknown reply kind {}", reply.reply))?;

        match kind {
            ReplyKind::Retry => Ok(Assignment::Retry),
            ReplyKind::Exit => Ok(Assignment::Exit),
            ReplyKind::Assigned => {
                let task = reply
                    .task
                    .ok_or_else(|| anyhow!("assignment without a task"))?;
                Ok(Assignment::Assigned(TaskDescriptor {
                    id: task.id,
                    kind: task_kind(task.kind)?,
                    inputs: task.inputs.into_iter().map(InputSplit::from).collect(),
                    n_map: task.n_map,
                    n_reduce: task.n_reduce,
                    work_dir: task.work_dir,
                    output_dir: task.output_dir,
                    workload: task.workload,
                    aux: task.aux,
                }))
            }
        }
    }
}
