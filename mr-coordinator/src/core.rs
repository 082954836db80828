use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use common::rpc::{
    self, Ack, Coordinator, DoneReport, FailureReport, StatusReply, StatusRequest, TaskReply,
    TaskRequest, TaskRow, WireTaskKind, WorkerRow,
};
use common::source::TaskSource;
use common::task::{Assignment, Phase, TaskId, TaskKind};

use crate::plan::JobPlan;
use crate::tasks::{CoordinatorConfig, Snapshot, TaskFailure, TaskTable};

/// Shared handle to the task table.
///
/// Cloning is cheap; every clone sees the same table. In-process workers
/// call it directly, remote workers reach it through the gRPC service.
#[derive(Debug, Clone)]
pub struct MRCoordinator {
    table: Arc<Mutex<TaskTable>>,
    phase: Arc<watch::Sender<Phase>>,
}

impl MRCoordinator {
    pub fn new(plan: JobPlan, config: CoordinatorConfig) -> Self {
        info!(
            "Coordinating {} map and {} reduce task(s) of `{}`",
            plan.n_map(),
            plan.n_reduce,
            plan.workload
        );
        let table = TaskTable::new(plan, config);
        let (phase, _) = watch::channel(table.phase());
        Self {
            table: Arc::new(Mutex::new(table)),
            phase: Arc::new(phase),
        }
    }

    pub async fn request_task(&self, worker_id: &str) -> Assignment {
        let mut table = self.table.lock().await;
        let assignment = table.request_task(worker_id, Instant::now());
        self.publish(&table);
        assignment
    }

    pub async fn report_done(&self, worker_id: &str, task_id: TaskId, kind: TaskKind) {
        let mut table = self.table.lock().await;
        table.report_done(worker_id, task_id, kind, Instant::now());
        self.publish(&table);
    }

    pub async fn report_failed(
        &self,
        worker_id: &str,
        task_id: TaskId,
        kind: TaskKind,
        message: &str,
    ) {
        let mut table = self.table.lock().await;
        table.report_failed(worker_id, task_id, kind, message, Instant::now());
        self.publish(&table);
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.table.lock().await.snapshot(Instant::now())
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub async fn failure(&self) -> Option<TaskFailure> {
        self.table.lock().await.failure().cloned()
    }

    pub async fn plan(&self) -> JobPlan {
        self.table.lock().await.plan().clone()
    }

    /// Wait until the job is Done or Failed.
    pub async fn wait_finished(&self) -> Phase {
        let mut rx = self.phase.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let phase = match rx.wait_for(|phase| phase.is_finished()).await {
            Ok(phase) => *phase,
            Err(_) => self.phase(),
        };
        phase
    }

    /// Periodically reclaim stragglers, so the table stays accurate even
    /// when no worker is asking for work.
    pub fn spawn_monitor(&self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let mut table = coordinator.table.lock().await;
                let reclaimed = table.reclaim_expired(Instant::now());
                if reclaimed > 0 {
                    debug!("Monitor reclaimed {} task(s)", reclaimed);
                }
                if table.phase().is_finished() {
                    break;
                }
            }
        })
    }

    fn publish(&self, table: &TaskTable) {
        let phase = table.phase();
        self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
    }
}

#[tonic::async_trait]
impl TaskSource for MRCoordinator {
    async fn request_task(&mut self, worker_id: &str) -> Result<Assignment> {
        Ok(MRCoordinator::request_task(self, worker_id).await)
    }

    async fn report_done(&mut self, worker_id: &str, task_id: TaskId, kind: TaskKind) -> Result<()> {
        MRCoordinator::report_done(self, worker_id, task_id, kind).await;
        Ok(())
    }

    async fn report_failed(
        &mut self,
        worker_id: &str,
        task_id: TaskId,
        kind: TaskKind,
        message: &str,
    ) -> Result<()> {
        MRCoordinator::report_failed(self, worker_id, task_id, kind, message).await;
        Ok(())
    }
}

fn require_worker_id(worker_id: &str) -> Result<(), Status> {
    if worker_id.is_empty() {
        return Err(Status::invalid_argument("worker_id must not be empty"));
    }
    Ok(())
}

#[tonic::async_trait]
impl Coordinator for MRCoordinator {
    async fn request_task(
        &self,
        request: Request<TaskRequest>,
    ) -> Result<Response<TaskReply>, Status> {
        let request = request.into_inner();
        require_worker_id(&request.worker_id)?;

        let assignment = MRCoordinator::request_task(self, &request.worker_id).await;
        Ok(Response::new(assignment.into()))
    }

    async fn report_done(&self, request: Request<DoneReport>) -> Result<Response<Ack>, Status> {
        let report = request.into_inner();
        require_worker_id(&report.worker_id)?;

        let kind = rpc::task_kind(report.kind)?;
        MRCoordinator::report_done(self, &report.worker_id, report.task_id, kind).await;
        Ok(Response::new(Ack {}))
    }

    async fn report_failed(
        &self,
        request: Request<FailureReport>,
    ) -> Result<Response<Ack>, Status> {
        let report = request.into_inner();
        require_worker_id(&report.worker_id)?;

        let kind = rpc::task_kind(report.kind)?;
        MRCoordinator::report_failed(self, &report.worker_id, report.task_id, kind, &report.message)
            .await;
        Ok(Response::new(Ack {}))
    }

    async fn status(&self, _: Request<StatusRequest>) -> Result<Response<StatusReply>, Status> {
        let snapshot = self.snapshot().await;
        Ok(Response::new(snapshot.into()))
    }
}

impl From<Snapshot> for StatusReply {
    fn from(snapshot: Snapshot) -> Self {
        let tasks = snapshot
            .tasks
            .into_iter()
            .map(|t| TaskRow {
                kind: WireTaskKind::from(t.kind) as i32,
                id: t.id,
                status: t.status.to_string(),
                worker: t.worker.unwrap_or_default(),
                attempts: t.attempts,
                failures: t.failures,
                running_ms: t.running.map_or(0, |d| d.as_millis() as u64),
            })
            .collect();

        let workers = snapshot
            .workers
            .into_iter()
            .map(|w| WorkerRow {
                worker_id: w.worker_id,
                state: w.state.to_string(),
                tasks_completed: w.tasks_completed,
                last_seen_ms: w.last_seen.as_millis() as u64,
            })
            .collect();

        let error = snapshot
            .failure
            .map(|f| common::Error::from(f).to_string())
            .unwrap_or_default();

        StatusReply {
            phase: snapshot.phase.to_string(),
            tasks,
            workers,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OutputMode;
    use common::task::TaskStatus;
    use std::path::PathBuf;

    fn coordinator(n_map: u32, n_reduce: u32, timeout: Duration) -> MRCoordinator {
        let plan = JobPlan {
            splits: vec![vec![]; n_map as usize],
            n_reduce,
            work_dir: PathBuf::from("/tmp/mr-work"),
            output: PathBuf::from("/tmp/out"),
            output_mode: OutputMode::Merged,
            workload: "wc".into(),
            aux: vec![],
        };
        let config = CoordinatorConfig {
            straggler_timeout: timeout,
            ..Default::default()
        };
        MRCoordinator::new(plan, config)
    }

    #[tokio::test]
    async fn wait_finished_wakes_on_done() {
        let coordinator = coordinator(1, 1, Duration::from_secs(10));
        let waiter = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.wait_finished().await })
        };

        for kind in [TaskKind::Map, TaskKind::Reduce] {
            let Assignment::Assigned(task) = coordinator.request_task("w").await else {
                panic!("expected a {kind} task");
            };
            coordinator.report_done("w", task.id, kind).await;
        }

        assert_eq!(waiter.await.unwrap(), Phase::Done);
        assert_eq!(coordinator.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn grpc_rejects_empty_worker_id() {
        let coordinator = coordinator(1, 1, Duration::from_secs(10));
        let request = Request::new(TaskRequest {
            worker_id: String::new(),
        });
        let status = Coordinator::request_task(&coordinator, request)
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn grpc_status_reports_tasks() {
        let coordinator = coordinator(2, 1, Duration::from_secs(10));
        coordinator.request_task("w").await;

        let reply = Coordinator::status(&coordinator, Request::new(StatusRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.phase, "map");
        assert_eq!(reply.tasks.len(), 3);
        assert_eq!(reply.tasks[0].status, "in-progress");
        assert_eq!(reply.tasks[0].worker, "w");
        assert_eq!(reply.workers[0].state, "mapping");
        assert!(reply.error.is_empty());
    }

    #[tokio::test]
    async fn monitor_reclaims_stragglers() {
        let coordinator = coordinator(1, 1, Duration::from_millis(20));
        let token = CancellationToken::new();
        let monitor = coordinator.spawn_monitor(Duration::from_millis(10), token.clone());

        coordinator.request_task("crashed").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.tasks[0].status, TaskStatus::Idle);
        assert_eq!(snapshot.tasks[0].worker, None);

        token.cancel();
        monitor.await.unwrap();
    }
}
