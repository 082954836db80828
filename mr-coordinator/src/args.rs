use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The port for the server to run on.
    #[arg(short, long, default_value = "8030")]
    pub port: u16,

    /// Directory holding the input files.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file, or directory when `--output-mode partitioned`.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Directory for intermediate files. Defaults to `.<output name>.mr-work`
    /// next to the output.
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Number of map tasks.
    #[arg(short = 'm', long, default_value = "4")]
    pub n_map: u32,

    /// Number of reduce tasks.
    #[arg(short = 'r', long, default_value = "4")]
    pub n_reduce: u32,

    /// Largest input segment a map task reads at once.
    #[arg(long, default_value_t = common::store::DEFAULT_MAX_SPLIT_BYTES)]
    pub max_split_bytes: u64,

    /// Name of the workload workers run.
    #[arg(short, long, default_value = "wc")]
    pub workload: String,

    /// Seconds a task may run before it is handed to another worker.
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,

    /// Failures after which a task fails the job.
    #[arg(long, default_value = "2")]
    pub max_attempts: u32,

    #[arg(long, value_enum, default_value = "merged")]
    pub output_mode: Mode,

    /// Keep intermediate files once the job is done.
    #[arg(long)]
    pub keep_intermediate: bool,

    /// Milliseconds to keep serving after the job finishes, so polling
    /// workers get told to exit.
    #[arg(long, default_value = "2000")]
    pub grace_ms: u64,

    /// Auxiliary arguments passed to the workload.
    #[arg(last = true)]
    pub aux: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Mode {
    Merged,
    Partitioned,
}
