//! The worker's view of the coordinator.

use anyhow::Result;
use tonic::transport::Channel;

use crate::rpc::{
    CoordinatorClient, DoneReport, FailureReport, TaskRequest, WireTaskKind,
};
use crate::task::{Assignment, TaskId, TaskKind};

/// Where a worker gets its tasks from and reports back to.
///
/// Implemented by the in-process coordinator handle and by the gRPC client,
/// so the worker loop does not care how requests travel.
#[tonic::async_trait]
pub trait TaskSource: Send {
    /// Ask for the next task.
    async fn request_task(&mut self, worker_id: &str) -> Result<Assignment>;

    /// Report that a task's output is in place.
    async fn report_done(&mut self, worker_id: &str, task_id: TaskId, kind: TaskKind)
        -> Result<()>;

    /// Report that the user function failed on a task.
    async fn report_failed(
        &mut self,
        worker_id: &str,
        task_id: TaskId,
        kind: TaskKind,
        message: &str,
    ) -> Result<()>;
}

#[tonic::async_trait]
impl TaskSource for CoordinatorClient<Channel> {
    async fn request_task(&mut self, worker_id: &str) -> Result<Assignment> {
        let request = tonic::Request::new(TaskRequest {
            worker_id: worker_id.to_string(),
        });
        let reply = CoordinatorClient::request_task(self, request)
            .await?
            .into_inner();
        Assignment::try_from(reply)
    }

    async fn report_done(
        &mut self,
        worker_id: &str,
        task_id: TaskId,
        kind: TaskKind,
    ) -> Result<()> {
        let request = tonic::Request::new(DoneReport {
            worker_id: worker_id.to_string(),
            task_id,
            kind: WireTaskKind::from(kind) as i32,
        });
        CoordinatorClient::report_done(self, request).await?;
        Ok(())
    }

    async fn report_failed(
        &mut self,
        worker_id: &str,
        task_id: TaskId,
        kind: TaskKind,
        message: &str,
    ) -> Result<()> {
        let request = tonic::Request::new(FailureReport {
            worker_id: worker_id.to_string(),
            task_id,
            kind: WireTaskKind::from(kind) as i32,
            message: message.to_string(),
        });
        CoordinatorClient::report_failed(self, request).await?;
        Ok(())
    }
}
