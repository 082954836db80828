use clap::Parser;
use tracing::info;

use mr_coordinator::OutputMode;
use mr_job::{Job, JobConfig};

mod args;
use args::Args;

fn config_from(args: Args) -> Result<JobConfig, common::Error> {
    let mut config = match &args.config {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::default(),
    };

    config.input_dir = args.input;
    config.output = args.output;
    config.n_reduce = args.n_reduce;
    config.n_map = args.n_map;

    if let Some(workload) = args.workload {
        config.workload = workload;
    }
    if let Some(bytes) = args.max_split_bytes {
        config.max_split_bytes = bytes;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(ms) = args.straggler_ms {
        config.straggler_timeout_ms = ms;
    }
    if let Some(secs) = args.timeout {
        config.job_timeout_ms = Some(secs * 1000);
    }
    if args.partitioned {
        config.output_mode = OutputMode::Partitioned;
    }
    if args.keep_intermediate {
        config.keep_intermediate = true;
    }
    if !args.aux.is_empty() {
        config.aux = args.aux;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config_from(Args::parse())?;
    let job = Job::create(config)?;
    let output = job.run().await?;

    for file in output.files() {
        info!("Output written to {}", file.display());
    }
    Ok(())
}
