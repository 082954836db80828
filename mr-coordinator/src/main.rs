mod args;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

use args::{Args, Mode};
use common::rpc::CoordinatorServer;
use common::task::Phase;
use mr_coordinator::plan::default_work_dir;
use mr_coordinator::{CoordinatorConfig, JobPlan, MRCoordinator, OutputMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let addr: SocketAddr = format!("[::]:{}", args.port).parse()?;
    let output_mode = match args.output_mode {
        Mode::Merged => OutputMode::Merged,
        Mode::Partitioned => OutputMode::Partitioned,
    };
    let work_dir = args
        .work_dir
        .unwrap_or_else(|| default_work_dir(&args.output));

    let plan = JobPlan::new(
        &args.input,
        args.n_map,
        args.n_reduce,
        args.max_split_bytes,
        work_dir,
        args.output,
        output_mode,
        args.workload,
        args.aux,
    )?;
    plan.prepare()?;

    let config = CoordinatorConfig {
        straggler_timeout: Duration::from_secs(args.timeout),
        max_task_attempts: args.max_attempts,
    };
    let coordinator = MRCoordinator::new(plan, config);

    let shutdown = CancellationToken::new();
    let monitor = coordinator.spawn_monitor(Duration::from_secs(1), shutdown.clone());

    let server = {
        let service = CoordinatorServer::new(coordinator.clone());
        let shutdown = shutdown.clone();
        info!("CoordinatorServer listening on {}", addr);
        tokio::spawn(
            Server::builder()
                .add_service(service)
                .serve_with_shutdown(addr, shutdown.cancelled_owned()),
        )
    };

    let phase = match wait_or_interrupt(&coordinator, tokio::signal::ctrl_c()).await {
        Ok(phase) => phase,
        Err(e) => {
            shutdown.cancel();
            return Err(e);
        }
    };

    // Let polling workers see the job is over before the server goes away.
    tokio::time::sleep(Duration::from_millis(args.grace_ms)).await;
    shutdown.cancel();
    server.await??;
    monitor.await?;

    match phase {
        Phase::Done => {
            let plan = coordinator.plan().await;
            let output = plan.finish(args.keep_intermediate)?;
            info!("Job done, output in {}", output.display());
            Ok(())
        }
        _ => {
            let err: anyhow::Error = match coordinator.failure().await {
                Some(failure) => common::Error::from(failure).into(),
                None => anyhow!("job ended in phase {}", phase),
            };
            error!("{}", err);
            Err(err)
        }
    }
}

/// Wait for the job to finish. Resolving `interrupt` first is an error.
async fn wait_or_interrupt<F, T>(coordinator: &MRCoordinator, interrupt: F) -> anyhow::Result<Phase>
where
    F: Future<Output = T>,
{
    tokio::select! {
        phase = coordinator.wait_finished() => Ok(phase),
        _ = interrupt => Err(anyhow!("interrupted before the job finished")),
    }
}
