//! Runs a whole MapReduce job in one process: a coordinator and a pool of
//! workers talking to it directly.

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use common::task::Phase;
use common::{Error, Workload};
use mr_coordinator::{plan, JobPlan, MRCoordinator, OutputMode};
use mr_worker::Worker;

pub mod config;

pub use config::JobConfig;

/// Where a finished job left its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    /// The output file, or the directory of partitions.
    pub path: PathBuf,
    pub mode: OutputMode,
    pub n_reduce: u32,
}

impl JobOutput {
    /// Every file holding part of the output, in partition order.
    pub fn files(&self) -> Vec<PathBuf> {
        match self.mode {
            OutputMode::Merged => vec![self.path.clone()],
            OutputMode::Partitioned => (0..self.n_reduce)
                .map(|r| common::store::output_path(&self.path, r))
                .collect(),
        }
    }
}

/// A validated job, ready to run.
#[derive(Debug)]
pub struct Job {
    config: JobConfig,
    workload: Workload,
}

impl Job {
    /// Check the configuration. Nothing is read or written yet.
    pub fn create(config: JobConfig) -> Result<Job, Error> {
        plan::validate(&config.input_dir, config.n_map, config.n_reduce)?;
        if config.workers == 0 {
            return Err(Error::Config("a job needs at least one worker".into()));
        }
        if config.max_task_attempts == 0 {
            return Err(Error::Config("max_task_attempts must be at least 1".into()));
        }

        let workload = match config.functions {
            Some(workload) => workload,
            None => workload::try_named(&config.workload).ok_or_else(|| {
                Error::Config(format!(
                    "unknown workload `{}`, expected one of {}",
                    config.workload,
                    workload::NAMES.join(", ")
                ))
            })?,
        };

        Ok(Job { config, workload })
    }

    /// Split the input, run every task to completion and assemble the output.
    pub async fn run(&self) -> Result<JobOutput, Error> {
        let config = &self.config;
        let plan = JobPlan::new(
            &config.input_dir,
            config.n_map,
            config.n_reduce,
            config.max_split_bytes,
            config.work_dir(),
            config.output.clone(),
            config.output_mode,
            config.workload.clone(),
            config.aux.clone(),
        )?;
        plan.prepare()?;

        let coordinator = MRCoordinator::new(plan.clone(), config.coordinator_config());

        let mut workers = JoinSet::new();
        for i in 0..config.workers {
            let worker = Worker::new(format!("worker-{i}"), coordinator.clone(), config.worker_config())
                .with_workload(self.workload);
            workers.spawn(worker.run());
        }
        info!("Started {} worker(s)", config.workers);

        let supervised = supervise(&coordinator, &mut workers);
        let phase = match config.job_timeout() {
            Some(limit) => match tokio::time::timeout(limit, supervised).await {
                Ok(phase) => phase,
                Err(_) => Err(Error::Timeout(limit)),
            },
            None => supervised.await,
        };

        let phase = match phase {
            Ok(phase) => phase,
            Err(e) => {
                workers.shutdown().await;
                return Err(e);
            }
        };

        if phase != Phase::Done {
            workers.shutdown().await;
            return Err(match coordinator.failure().await {
                Some(failure) => failure.into(),
                None => Error::WorkersExited,
            });
        }

        // Workers learn the job is over on their next request.
        drain(&mut workers, config.coordinator_config().straggler_timeout).await;

        let path = plan.finish(config.keep_intermediate)?;
        info!("Job done, output in {}", path.display());
        Ok(JobOutput {
            path,
            mode: config.output_mode,
            n_reduce: config.n_reduce,
        })
    }
}

/// Wait for the coordinator to finish, watching for the worker pool dying
/// under it.
async fn supervise(
    coordinator: &MRCoordinator,
    workers: &mut JoinSet<anyhow::Result<u32>>,
) -> Result<Phase, Error> {
    loop {
        tokio::select! {
            phase = coordinator.wait_finished() => return Ok(phase),
            joined = workers.join_next() => match joined {
                Some(Ok(Ok(completed))) => debug!("Worker exited after {} task(s)", completed),
                Some(Ok(Err(e))) => warn!("Worker stopped: {:#}", e),
                Some(Err(e)) => warn!("Worker crashed: {}", e),
                None => {
                    let phase = coordinator.phase();
                    if phase.is_finished() {
                        return Ok(phase);
                    }
                    return Err(Error::WorkersExited);
                }
            },
        }
    }
}

/// Let workers that are still busy (stragglers whose task was completed by
/// someone else) wind down, aborting those that take too long.
async fn drain(workers: &mut JoinSet<anyhow::Result<u32>>, patience: Duration) {
    let drained = async {
        while workers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(patience, drained).await.is_err() {
        debug!("Aborting {} straggling worker(s)", workers.len());
        workers.shutdown().await;
    }
}
