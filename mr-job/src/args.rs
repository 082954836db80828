use std::path::PathBuf;

use clap::Parser;

/// Run a MapReduce job in a single process.
#[derive(Parser, Debug)]
#[command(name = "mrj", version, about, long_about = None)]
pub struct Args {
    /// Directory holding the input files.
    pub input: PathBuf,

    /// Output file, or directory with `--partitioned`.
    pub output: PathBuf,

    /// Number of reduce tasks.
    pub n_reduce: u32,

    /// Number of map tasks.
    pub n_map: u32,

    /// Read defaults from a JSON job description. Flags given here win.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Built-in workload to run.
    #[arg(short, long)]
    pub workload: Option<String>,

    /// Largest input segment a map task reads at once, in bytes.
    #[arg(long)]
    pub max_split_bytes: Option<u64>,

    /// Number of worker tasks.
    #[arg(short = 'j', long)]
    pub workers: Option<u32>,

    /// Milliseconds before a running task is handed to another worker.
    #[arg(short, long)]
    pub straggler_ms: Option<u64>,

    /// Give up if the job takes longer than this many seconds.
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Write one file per partition into the output directory.
    #[arg(short, long)]
    pub partitioned: bool,

    /// Keep intermediate files.
    #[arg(short, long)]
    pub keep_intermediate: bool,

    /// Auxiliary arguments passed to the workload.
    #[arg(last = true)]
    pub aux: Vec<String>,
}
