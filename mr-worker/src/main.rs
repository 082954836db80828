use std::time::Duration;

use clap::Parser;
use tracing::info;

use common::rpc::CoordinatorClient;
use mr_worker::{Worker, WorkerConfig};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let id = args
        .id
        .unwrap_or_else(|| format!("worker-{}", std::process::id()));

    let client = CoordinatorClient::connect(args.address.clone()).await?;
    info!("Worker {} connected to {}", id, args.address);

    let config = WorkerConfig {
        poll_interval: Duration::from_millis(args.poll_ms),
        max_request_failures: args.max_request_failures,
    };
    let completed = Worker::new(id, client, config).run().await?;
    info!("Worker exiting after {} task(s)", completed);
    Ok(())
}
