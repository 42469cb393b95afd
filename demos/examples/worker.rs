use anyhow::Result;
use clap::Parser;
use qps::prelude::*;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser, Debug)]
struct WorkerCli {
    #[arg(short, long, default_value = "127.0.0.1:7621")]
    driver: SocketAddr,

    #[arg(short, long)]
    run_id: Uuid,

    #[arg(short, long, default_value_t = 0)]
    id: u32,

    #[arg(short('c'), long, default_value_t = 8)]
    concurrency: usize,

    #[arg(short('t'), long, value_parser = humantime::parse_duration, default_value = "10s")]
    duration: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("qps=debug,qps_runtime=debug")
        .init();

    let args = WorkerCli::parse();
    let worker = Worker::new(WorkerId(args.id), HistogramParams::default())?;

    let (tx, rx) = async_channel::bounded(1);
    let snapshots = tokio::spawn(worker.clone().snapshot_task(Duration::from_secs(1), tx));

    let deadline = Instant::now() + args.duration;
    let tasks: Vec<_> = (0..args.concurrency)
        .map(|i| {
            worker.spawn(async move {
                let mut rng = SmallRng::seed_from_u64(i as u64);
                while Instant::now() < deadline {
                    let _ = unary_call(&mut rng).await;
                }
            })
        })
        .collect();

    // Progress is logged by the snapshot task; the snapshots themselves are not needed here.
    let drain = tokio::spawn(async move { while rx.recv().await.is_ok() {} });

    for task in tasks {
        task.await?;
    }
    drain.abort();
    snapshots.await??;

    let stats = worker.client_stats(true)?;
    report_stats(args.driver, args.run_id, worker.id(), stats).await?;
    Ok(())
}

/// Stand-in for a real unary call: log-normal latency around 1ms, one in fifty unavailable.
#[rpc]
async fn unary_call(rng: &mut SmallRng) -> Result<(), Status> {
    let dist = LogNormal::new(0., 0.4).map_err(|_| Status::INTERNAL)?;
    let latency = Duration::from_micros((1_000. * dist.sample(rng)) as u64);
    tokio::time::sleep(latency).await;

    if rng.gen_range(0..50) == 0 {
        Err(Status::UNAVAILABLE)
    } else {
        Ok(())
    }
}
