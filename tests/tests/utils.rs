use qps::prelude::*;
use qps_runtime::RuntimeError;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("qps=trace,qps_core=debug,qps_runtime=debug,axum::rejection=trace")
            .try_init();
    });
}

/// Start `driver` on a free local port.
#[allow(unused)]
pub async fn spawn_driver(
    driver: DriverRuntime,
) -> (SocketAddr, JoinHandle<Result<RunReport, RuntimeError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, tokio::spawn(driver.run_on(listener)))
}
