use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{store, Error, Workload};
use mr_coordinator::{CoordinatorConfig, OutputMode};
use mr_worker::WorkerConfig;

/// Everything needed to run one job. Fixed once the job is created.
///
/// Can be read from JSON; fields that are left out take their default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Directory whose files are the job's input.
    pub input_dir: PathBuf,

    /// Output file, or directory in partitioned mode.
    pub output: PathBuf,

    pub n_map: u32,
    pub n_reduce: u32,

    /// Largest input segment a map task reads at once.
    pub max_split_bytes: u64,

    /// Built-in workload to run, unless `functions` is set.
    pub workload: String,

    /// Map and reduce functions. Take precedence over `workload`.
    #[serde(skip)]
    pub functions: Option<Workload>,

    /// Auxiliary arguments handed to the map and reduce functions.
    pub aux: Vec<String>,

    /// Number of in-process workers.
    pub workers: u32,

    /// Time a task may run before it is handed to another worker.
    pub straggler_timeout_ms: u64,

    /// Pause between requests of an idle worker.
    pub poll_interval_ms: u64,

    /// Failures after which a task fails the job.
    pub max_task_attempts: u32,

    pub output_mode: OutputMode,

    /// Intermediate files. Defaults to `.<output name>.mr-work` next to the output.
    pub work_dir: Option<PathBuf>,

    pub keep_intermediate: bool,

    /// Give up on the whole job after this long.
    pub job_timeout_ms: Option<u64>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output: PathBuf::from("output"),
            n_map: 4,
            n_reduce: 4,
            max_split_bytes: store::DEFAULT_MAX_SPLIT_BYTES,
            workload: "wc".to_string(),
            functions: None,
            aux: vec![],
            workers: 4,
            straggler_timeout_ms: 10_000,
            poll_interval_ms: 500,
            max_task_attempts: 2,
            output_mode: OutputMode::Merged,
            work_dir: None,
            keep_intermediate: false,
            job_timeout_ms: None,
        }
    }
}

impl JobConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output: impl Into<PathBuf>, n_map: u32, n_reduce: u32) -> Self {
        Self {
            input_dir: input_dir.into(),
            output: output.into(),
            n_map,
            n_reduce,
            ..Default::default()
        }
    }

    /// Read a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn with_functions(mut self, workload: Workload) -> Self {
        self.functions = Some(workload);
        self
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| mr_coordinator::plan::default_work_dir(&self.output))
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            straggler_timeout: Duration::from_millis(self.straggler_timeout_ms),
            max_task_attempts: self.max_task_attempts,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..Default::default()
        }
    }
}
