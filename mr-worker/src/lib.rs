//! A worker pulls tasks from a [`TaskSource`], runs them and reports back
//! until told to exit. It keeps no state between tasks.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, warn};

use common::source::TaskSource;
use common::task::{Assignment, TaskDescriptor, TaskKind, WorkerId};
use common::Workload;

pub mod map;
pub mod reduce;

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Pause between requests when no task is available.
    pub poll_interval: Duration,

    /// Consecutive failed requests after which the worker gives up.
    pub max_request_failures: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_request_failures: 5,
        }
    }
}

pub struct Worker<S> {
    id: WorkerId,
    source: S,
    config: WorkerConfig,

    /// Run this instead of resolving the workload named by each task.
    workload: Option<Workload>,
}

impl<S: TaskSource> Worker<S> {
    pub fn new(id: impl Into<WorkerId>, source: S, config: WorkerConfig) -> Self {
        Self {
            id: id.into(),
            source,
            config,
            workload: None,
        }
    }

    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Run tasks until the coordinator says the job is over. Returns the
    /// number of tasks this worker completed.
    pub async fn run(mut self) -> Result<u32> {
        let mut completed = 0;
        let mut request_failures = 0;

        loop {
            let assignment = match self.source.request_task(&self.id).await {
                Ok(assignment) => {
                    request_failures = 0;
                    assignment
                }
                Err(e) => {
                    request_failures += 1;
                    if request_failures >= self.config.max_request_failures {
                        return Err(e.context(format!(
                            "worker {} could not reach the coordinator",
                            self.id
                        )));
                    }
                    warn!("Worker {} request failed: {:#}", self.id, e);
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            match assignment {
                Assignment::Assigned(task) => {
                    if self.handle(task).await {
                        completed += 1;
                    }
                }
                Assignment::Retry => {
                    debug!("Worker {} idle", self.id);
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Assignment::Exit => {
                    info!("Worker {} told to exit", self.id);
                    return Ok(completed);
                }
            }
        }
    }

    /// Execute one task and report the outcome. Returns whether it succeeded.
    async fn handle(&mut self, task: TaskDescriptor) -> bool {
        let (id, kind) = (task.id, task.kind);
        info!("Worker {} starting {} task {}", self.id, kind, id);

        let workload = match self.workload {
            Some(workload) => Ok(workload),
            None => workload::try_named(&task.workload)
                .ok_or_else(|| anyhow!("unknown workload `{}`", task.workload)),
        };

        let outcome = match workload {
            Ok(workload) => execute(task, workload).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!("Worker {} finished {} task {}", self.id, kind, id);
                // Not retried: the straggler timeout takes care of a lost report.
                if let Err(e) = self.source.report_done(&self.id, id, kind).await {
                    warn!("Worker {} could not report {} task {}: {:#}", self.id, kind, id, e);
                }
                true
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!("Worker {} failed {} task {}: {}", self.id, kind, id, message);
                if let Err(e) = self
                    .source
                    .report_failed(&self.id, id, kind, &message)
                    .await
                {
                    warn!("Worker {} could not report failure: {:#}", self.id, e);
                }
                false
            }
        }
    }
}

/// Run a task on the blocking pool. A panicking user function is turned
/// into an error.
pub async fn execute(task: TaskDescriptor, workload: Workload) -> Result<()> {
    let kind = task.kind;
    let id = task.id;

    let handle = tokio::task::spawn_blocking(move || match task.kind {
        TaskKind::Map => map::perform_map(&task, &workload),
        TaskKind::Reduce => reduce::perform_reduce(&task, &workload),
    });

    match handle.await {
        Ok(result) => result.with_context(|| format!("{kind} task {id}")),
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow!("{kind} task {id} panicked: {message}"))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use common::task::{InputSplit, TaskId};
    use common::{KeyValue, MapOutput};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned assignments and records every report.
    #[derive(Default, Clone)]
    struct Script {
        replies: Arc<Mutex<VecDeque<Result<Assignment>>>>,
        done: Arc<Mutex<Vec<(TaskId, TaskKind)>>>,
        failed: Arc<Mutex<Vec<(TaskId, String)>>>,
    }

    impl Script {
        fn push(&self, reply: Result<Assignment>) {
            self.replies.lock().unwrap().push_back(reply);
        }
    }

    #[tonic::async_trait]
    impl TaskSource for Script {
        async fn request_task(&mut self, _: &str) -> Result<Assignment> {
            let reply = self.replies.lock().unwrap().pop_front();
            reply.unwrap_or(Ok(Assignment::Exit))
        }

        async fn report_done(&mut self, _: &str, id: TaskId, kind: TaskKind) -> Result<()> {
            self.done.lock().unwrap().push((id, kind));
            Ok(())
        }

        async fn report_failed(
            &mut self,
            _: &str,
            id: TaskId,
            _: TaskKind,
            message: &str,
        ) -> Result<()> {
            self.failed.lock().unwrap().push((id, message.to_string()));
            Ok(())
        }
    }

    fn panicking_map(_: KeyValue, _: Bytes) -> MapOutput {
        panic!("user code exploded")
    }

    fn fast() -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(1),
            max_request_failures: 3,
        }
    }

    fn map_task(dir: &tempfile::TempDir) -> TaskDescriptor {
        TaskDescriptor {
            id: 0,
            kind: TaskKind::Map,
            inputs: vec![],
            n_map: 1,
            n_reduce: 1,
            work_dir: dir.path().to_string_lossy().into_owned(),
            output_dir: dir.path().to_string_lossy().into_owned(),
            workload: "wc".into(),
            aux: vec![],
        }
    }

    #[tokio::test]
    async fn runs_until_exit_and_reports() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = Script::default();
        script.push(Ok(Assignment::Retry));
        script.push(Ok(Assignment::Assigned(map_task(&dir))));

        let completed = Worker::new("w", script.clone(), fast()).run().await.unwrap();

        assert_eq!(completed, 1);
        assert_eq!(*script.done.lock().unwrap(), [(0, TaskKind::Map)]);
        assert!(dir.path().join("mr-0-0").exists());
    }

    #[tokio::test]
    async fn panics_become_failure_reports() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        std::fs::write(&input, "x").unwrap();

        let mut task = map_task(&dir);
        task.inputs = vec![InputSplit {
            path: input.to_string_lossy().into_owned(),
            offset: 0,
            len: 1,
        }];

        let script = Script::default();
        script.push(Ok(Assignment::Assigned(task)));

        let workload = Workload {
            map_fn: panicking_map,
            reduce_fn: workload::wc::reduce,
        };
        let completed = Worker::new("w", script.clone(), fast())
            .with_workload(workload)
            .run()
            .await
            .unwrap();

        assert_eq!(completed, 0);
        let failed = script.failed.lock().unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].1.contains("user code exploded"));
        assert!(script.done.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_workload_is_a_task_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut task = map_task(&dir);
        task.workload = "nope".into();

        let script = Script::default();
        script.push(Ok(Assignment::Assigned(task)));
        Worker::new("w", script.clone(), fast()).run().await.unwrap();

        assert!(script.failed.lock().unwrap()[0].1.contains("unknown workload"));
    }

    #[tokio::test]
    async fn survives_a_few_request_failures() {
        let script = Script::default();
        script.push(Err(anyhow!("connection refused")));
        script.push(Err(anyhow!("connection refused")));

        let completed = Worker::new("w", script.clone(), fast()).run().await.unwrap();
        assert_eq!(completed, 0);

        for _ in 0..3 {
            script.push(Err(anyhow!("connection refused")));
        }
        let result = Worker::new("w", script, fast()).run().await;
        assert!(result.is_err());
    }
}
