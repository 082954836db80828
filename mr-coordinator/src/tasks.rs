//! The task table: the coordinator's single source of truth.
//!
//! Every map task starts Idle. Reduce tasks exist from the start but are not
//! handed out until every map task is Completed. A task that stays
//! InProgress longer than the straggler timeout goes back to Idle and is
//! handed out again; whichever execution reports first completes it.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use common::task::{Assignment, Phase, TaskId, TaskKind, TaskStatus, WorkerId};
use common::Error;

use crate::plan::JobPlan;
use crate::worker_info::{WorkerState, WorkerInfo};
use crate::worker_registry::WorkerRegistry;

/// Scheduling knobs.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// How long a task may stay InProgress before it is handed out again.
    pub straggler_timeout: Duration,

    /// Reported failures after which a task fails the whole job.
    pub max_task_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            straggler_timeout: Duration::from_secs(10),
            max_task_attempts: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub started_at: Option<Instant>,

    /// Last worker the task was handed to. Diagnostics only.
    pub assigned_worker: Option<WorkerId>,

    /// Times the task was handed out.
    pub attempts: u32,

    /// Failures reported by workers.
    pub failures: u32,
}

impl Task {
    fn new(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Idle,
            started_at: None,
            assigned_worker: None,
            attempts: 0,
            failures: 0,
        }
    }

    fn reset(&mut self) {
        self.status = TaskStatus::Idle;
        self.started_at = None;
        self.assigned_worker = None;
    }
}

/// The task that made a job fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: TaskKind,
    pub id: TaskId,
    pub attempts: u32,
    pub message: String,
}

impl From<TaskFailure> for Error {
    fn from(f: TaskFailure) -> Self {
        Error::TaskFailed {
            kind: f.kind,
            id: f.id,
            attempts: f.attempts,
            message: f.message,
        }
    }
}

#[derive(Debug)]
pub struct TaskTable {
    plan: JobPlan,
    config: CoordinatorConfig,
    phase: Phase,
    map_tasks: Vec<Task>,
    reduce_tasks: Vec<Task>,
    workers: WorkerRegistry,
    failure: Option<TaskFailure>,
}

impl TaskTable {
    pub fn new(plan: JobPlan, config: CoordinatorConfig) -> Self {
        let map_tasks = (0..plan.n_map()).map(|i| Task::new(i, TaskKind::Map)).collect();
        let reduce_tasks = (0..plan.n_reduce)
            .map(|i| Task::new(i, TaskKind::Reduce))
            .collect();

        let mut table = Self {
            plan,
            config,
            phase: Phase::Map,
            map_tasks,
            reduce_tasks,
            workers: WorkerRegistry::default(),
            failure: None,
        };
        table.advance();
        table
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn plan(&self) -> &JobPlan {
        &self.plan
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.as_ref()
    }

    pub fn tasks(&self, kind: TaskKind) -> &[Task] {
        match kind {
            TaskKind::Map => &self.map_tasks,
            TaskKind::Reduce => &self.reduce_tasks,
        }
    }

    /// Hand the lowest-numbered Idle task of the current phase to `worker`.
    pub fn request_task(&mut self, worker: &str, now: Instant) -> Assignment {
        self.workers.touch(worker, now);

        let Some(kind) = self.phase.task_kind() else {
            debug!("Telling {} to exit, job is {}", worker, self.phase);
            self.workers.set_worker_state(worker, WorkerState::Free);
            return Assignment::Exit;
        };

        self.reclaim_expired(now);

        let tasks = match kind {
            TaskKind::Map => &mut self.map_tasks,
            TaskKind::Reduce => &mut self.reduce_tasks,
        };
        let Some(task) = tasks.iter_mut().find(|t| t.status == TaskStatus::Idle) else {
            self.workers.set_worker_state(worker, WorkerState::Free);
            return Assignment::Retry;
        };

        task.status = TaskStatus::InProgress;
        task.started_at = Some(now);
        task.assigned_worker = Some(worker.to_string());
        task.attempts += 1;

        if task.attempts > 1 {
            info!(
                "Reassigning {} task {} to {} (attempt {})",
                kind, task.id, worker, task.attempts
            );
        } else {
            info!("Assigning {} task {} to {}", kind, task.id, worker);
        }

        let id = task.id;
        self.workers
            .set_worker_state(worker, WorkerState::from_task_kind(kind));
        Assignment::Assigned(self.plan.descriptor(kind, id))
    }

    /// Mark a task Completed. Returns whether the report changed anything.
    ///
    /// Reports for an unknown task, for a phase that is over, or for a task
    /// that is already Completed are ignored. A report from a worker whose
    /// task was reclaimed by the straggler timeout is honored: its output is
    /// already in place.
    pub fn report_done(&mut self, worker: &str, id: TaskId, kind: TaskKind, now: Instant) -> bool {
        self.workers.touch(worker, now);
        self.workers.set_worker_state(worker, WorkerState::Free);

        let Some(task) = self.current_task_mut(kind, id) else {
            debug!("Ignoring done report for {} task {} from {}", kind, id, worker);
            return false;
        };
        if task.status == TaskStatus::Completed {
            debug!("Ignoring duplicate done report for {} task {} from {}", kind, id, worker);
            return false;
        }

        task.status = TaskStatus::Completed;
        task.started_at = None;
        info!("{} task {} completed by {}", kind, id, worker);

        self.workers.record_completion(worker);
        self.advance();
        true
    }

    /// Record a failure of the user function. Once a task has failed
    /// `max_task_attempts` times the whole job fails.
    pub fn report_failed(
        &mut self,
        worker: &str,
        id: TaskId,
        kind: TaskKind,
        message: &str,
        now: Instant,
    ) {
        self.workers.touch(worker, now);
        self.workers.set_worker_state(worker, WorkerState::Free);

        let max_attempts = self.config.max_task_attempts;
        let Some(task) = self.current_task_mut(kind, id) else {
            debug!("Ignoring failure report for {} task {} from {}", kind, id, worker);
            return;
        };
        if task.status == TaskStatus::Completed {
            debug!("Ignoring failure report for completed {} task {}", kind, id);
            return;
        }

        task.failures += 1;
        if task.failures >= max_attempts {
            error!(
                "{} task {} failed {} time(s), giving up: {}",
                kind, id, task.failures, message
            );
            let failure = TaskFailure {
                kind,
                id,
                attempts: task.failures,
                message: message.to_string(),
            };
            self.failure = Some(failure);
            self.phase = Phase::Failed;
            return;
        }

        warn!("{} task {} failed on {}: {}", kind, id, worker, message);
        // Leave a reassigned copy alone.
        if task.status == TaskStatus::InProgress
            && task.assigned_worker.as_deref() == Some(worker)
        {
            task.reset();
        }
    }

    /// Return every task of the current phase that has been InProgress for
    /// longer than the straggler timeout to Idle. Returns how many were.
    pub fn reclaim_expired(&mut self, now: Instant) -> usize {
        let Some(kind) = self.phase.task_kind() else {
            return 0;
        };
        let timeout = self.config.straggler_timeout;
        let tasks = match kind {
            TaskKind::Map => &mut self.map_tasks,
            TaskKind::Reduce => &mut self.reduce_tasks,
        };

        let mut reclaimed = 0;
        for task in tasks.iter_mut().filter(|t| t.status == TaskStatus::InProgress) {
            let expired = task
                .started_at
                .is_some_and(|t| now.saturating_duration_since(t) >= timeout);
            if expired {
                warn!(
                    "{} task {} timed out on {}",
                    kind,
                    task.id,
                    task.assigned_worker.as_deref().unwrap_or("?")
                );
                task.reset();
                reclaimed += 1;
            }
        }
        reclaimed
    }

    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let tasks = self
            .map_tasks
            .iter()
            .chain(&self.reduce_tasks)
            .map(|t| TaskView {
                kind: t.kind,
                id: t.id,
                status: t.status,
                worker: t.assigned_worker.clone(),
                attempts: t.attempts,
                failures: t.failures,
                running: t.started_at.map(|s| now.saturating_duration_since(s)),
            })
            .collect();

        let workers = self
            .workers
            .iter()
            .map(|(id, info)| WorkerView::new(id, info, now))
            .collect();

        Snapshot {
            phase: self.phase,
            tasks,
            workers,
            failure: self.failure.clone(),
        }
    }

    fn current_task_mut(&mut self, kind: TaskKind, id: TaskId) -> Option<&mut Task> {
        if self.phase.task_kind() != Some(kind) {
            return None;
        }
        let tasks = match kind {
            TaskKind::Map => &mut self.map_tasks,
            TaskKind::Reduce => &mut self.reduce_tasks,
        };
        // Never handed out: a report for it cannot be genuine.
        tasks.get_mut(id as usize).filter(|t| t.attempts > 0)
    }

    fn advance(&mut self) {
        loop {
            let next = match self.phase {
                Phase::Map if all_completed(&self.map_tasks) => Phase::Reduce,
                Phase::Reduce if all_completed(&self.reduce_tasks) => Phase::Done,
                _ => return,
            };
            info!("Phase {} -> {}", self.phase, next);
            self.phase = next;
        }
    }
}

fn all_completed(tasks: &[Task]) -> bool {
    tasks.iter().all(|t| t.status == TaskStatus::Completed)
}

/////////////////////////////////////////////////////////////////////////////
// Snapshots
/////////////////////////////////////////////////////////////////////////////

/// A consistent copy of the task table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub phase: Phase,
    pub tasks: Vec<TaskView>,
    pub workers: Vec<WorkerView>,
    pub failure: Option<TaskFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub kind: TaskKind,
    pub id: TaskId,
    pub status: TaskStatus,
    pub worker: Option<WorkerId>,
    pub attempts: u32,
    pub failures: u32,
    pub running: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerView {
    pub worker_id: WorkerId,
    pub state: WorkerState,
    pub tasks_completed: u32,
    pub last_seen: Duration,
}

impl WorkerView {
    fn new(id: &str, info: &WorkerInfo, now: Instant) -> Self {
        Self {
            worker_id: id.to_string(),
            state: info.state,
            tasks_completed: info.tasks_completed,
            last_seen: now.saturating_duration_since(info.last_seen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OutputMode;
    use std::path::PathBuf;

    fn table(n_map: u32, n_reduce: u32) -> TaskTable {
        let plan = JobPlan {
            splits: vec![vec![]; n_map as usize],
            n_reduce,
            work_dir: PathBuf::from("/tmp/mr-work"),
            output: PathBuf::from("/tmp/out"),
            output_mode: OutputMode::Merged,
            workload: "wc".into(),
            aux: vec![],
        };
        TaskTable::new(plan, CoordinatorConfig::default())
    }

    fn assigned(a: Assignment) -> (TaskKind, TaskId) {
        match a {
            Assignment::Assigned(t) => (t.kind, t.id),
            other => panic!("expected a task, got {other:?}"),
        }
    }

    #[test]
    fn hands_out_lowest_idle_id_first() {
        let mut t = table(3, 1);
        let now = Instant::now();

        assert_eq!(assigned(t.request_task("a", now)), (TaskKind::Map, 0));
        assert_eq!(assigned(t.request_task("b", now)), (TaskKind::Map, 1));
        assert_eq!(assigned(t.request_task("c", now)), (TaskKind::Map, 2));
        assert_eq!(t.request_task("d", now), Assignment::Retry);
    }

    #[test]
    fn reduce_waits_for_every_map() {
        let mut t = table(2, 2);
        let now = Instant::now();

        t.request_task("a", now);
        t.request_task("b", now);
        assert!(t.report_done("a", 0, TaskKind::Map, now));
        assert_eq!(t.phase(), Phase::Map);
        // Map 1 still running: nothing else to hand out.
        assert_eq!(t.request_task("a", now), Assignment::Retry);

        assert!(t.report_done("b", 1, TaskKind::Map, now));
        assert_eq!(t.phase(), Phase::Reduce);
        assert_eq!(assigned(t.request_task("a", now)), (TaskKind::Reduce, 0));
        assert_eq!(assigned(t.request_task("b", now)), (TaskKind::Reduce, 1));

        t.report_done("b", 1, TaskKind::Reduce, now);
        t.report_done("a", 0, TaskKind::Reduce, now);
        assert_eq!(t.phase(), Phase::Done);
        assert_eq!(t.request_task("a", now), Assignment::Exit);
    }

    #[test]
    fn duplicate_and_stray_reports_change_nothing() {
        let mut t = table(2, 1);
        let now = Instant::now();

        t.request_task("a", now);
        assert!(t.report_done("a", 0, TaskKind::Map, now));
        assert!(!t.report_done("a", 0, TaskKind::Map, now));
        // Wrong phase, unknown id, never handed out.
        assert!(!t.report_done("a", 0, TaskKind::Reduce, now));
        assert!(!t.report_done("a", 9, TaskKind::Map, now));
        assert!(!t.report_done("a", 1, TaskKind::Map, now));

        let snapshot = t.snapshot(now);
        assert_eq!(snapshot.phase, Phase::Map);
        let statuses: Vec<_> = snapshot.tasks.iter().map(|t| (t.kind, t.status)).collect();
        assert_eq!(
            statuses,
            [
                (TaskKind::Map, TaskStatus::Completed),
                (TaskKind::Map, TaskStatus::Idle),
                (TaskKind::Reduce, TaskStatus::Idle),
            ]
        );
        assert_eq!(snapshot.workers[0].tasks_completed, 1);
    }

    #[test]
    fn late_report_after_phase_change_is_ignored() {
        let mut t = table(1, 1);
        let start = Instant::now();
        let later = start + Duration::from_secs(11);

        t.request_task("slow", start);
        assert_eq!(assigned(t.request_task("fast", later)), (TaskKind::Map, 0));
        assert!(t.report_done("fast", 0, TaskKind::Map, later));
        assert_eq!(t.phase(), Phase::Reduce);

        assert!(!t.report_done("slow", 0, TaskKind::Map, later));
        assert_eq!(t.phase(), Phase::Reduce);
    }

    #[test]
    fn stragglers_are_reassigned_after_timeout() {
        let mut t = table(1, 1);
        let start = Instant::now();

        assert_eq!(assigned(t.request_task("crashed", start)), (TaskKind::Map, 0));
        assert_eq!(
            t.request_task("b", start + Duration::from_secs(9)),
            Assignment::Retry
        );

        let later = start + Duration::from_secs(10);
        assert_eq!(assigned(t.request_task("b", later)), (TaskKind::Map, 0));

        let view = &t.snapshot(later).tasks[0];
        assert_eq!(view.attempts, 2);
        assert_eq!(view.worker.as_deref(), Some("b"));
    }

    #[test]
    fn first_completion_wins_after_reclaim() {
        let mut t = table(1, 1);
        let start = Instant::now();

        t.request_task("slow", start);
        assert_eq!(t.reclaim_expired(start + Duration::from_secs(30)), 1);
        assert_eq!(t.tasks(TaskKind::Map)[0].status, TaskStatus::Idle);

        // The original worker finishes anyway.
        assert!(t.report_done("slow", 0, TaskKind::Map, start));
        assert_eq!(t.phase(), Phase::Reduce);
    }

    #[test]
    fn failure_budget_fails_the_job() {
        let mut t = table(1, 1);
        let now = Instant::now();

        t.request_task("a", now);
        t.report_failed("a", 0, TaskKind::Map, "boom", now);
        assert_eq!(t.phase(), Phase::Map);
        assert_eq!(t.tasks(TaskKind::Map)[0].status, TaskStatus::Idle);

        assert_eq!(assigned(t.request_task("b", now)), (TaskKind::Map, 0));
        t.report_failed("b", 0, TaskKind::Map, "boom again", now);
        assert_eq!(t.phase(), Phase::Failed);
        assert_eq!(t.request_task("a", now), Assignment::Exit);

        let err = Error::from(t.failure().cloned().unwrap());
        assert!(matches!(
            err,
            Error::TaskFailed { kind: TaskKind::Map, id: 0, attempts: 2, .. }
        ));
    }

    #[test]
    fn no_tasks_means_done() {
        let t = table(0, 0);
        assert_eq!(t.phase(), Phase::Done);
    }
}
