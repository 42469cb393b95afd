use anyhow::Result;
use qps::prelude::*;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("qps=debug,qps_core=debug,qps_runtime=debug")
        .init();

    let driver = DriverRuntime::new().with_args();
    tracing::info!("Workers should report under run id {}", driver.run_id());

    let report = driver.run().await?;
    println!("{report}");
    Ok(())
}
