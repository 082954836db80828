use std::time::Duration;

use crate::task::{TaskId, TaskKind};

/// Terminal errors of a job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad task counts or an unreadable input location.
    #[error("invalid job configuration: {0}")]
    Config(String),

    /// A user function failed on every attempt the job allows.
    #[error("{kind} task {id} failed after {attempts} attempt(s): {message}")]
    TaskFailed {
        kind: TaskKind,
        id: TaskId,
        attempts: u32,
        message: String,
    },

    /// Every worker stopped while tasks were still outstanding.
    #[error("all workers exited before the job finished")]
    WorkersExited,

    #[error("job did not finish within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<tonic::transport::Error> for Error {
    fn from(e: tonic::transport::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
