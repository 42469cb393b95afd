//! Default qps driver runtime
//!
//! The driver listens for worker reports on a websocket endpoint, merges them and hands back a
//! [`RunReport`] once every worker has reported or the report timeout runs out.
use crate::{
    collector::collect,
    error::RuntimeError,
    server::{bind, server_task},
};
use clap::Parser;
use qps_core::{Aggregator, HistogramParams, RunConfig, RunReport, DEFAULT_REPORT_TIMEOUT};
use std::time::Duration;
use tokio::net::TcpListener;
#[allow(unused)]
use tracing::{debug, error, info, instrument, Instrument};
use uuid::Uuid;

const DEFAULT_PORT: u16 = 7621;
const REPORT_QUEUE: usize = 64;

#[derive(Parser, Debug)]
#[command(version = "0.1")]
struct DriverCli {
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    #[arg(short, long)]
    run_id: Option<Uuid>,
}

/// Default qps driver runtime. (requires `rt` feature)
///
/// # Example
///
/// ```ignore
/// use qps::prelude::*;
///
/// #[tokio::main]
/// async fn main() {
///     let report = DriverRuntime::new()
///         .with_args()
///         .run()
///         .await
///         .unwrap();
///     println!("{report}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DriverRuntime {
    port: u16,
    run_id: Uuid,
    config: RunConfig,
}

impl Default for DriverRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRuntime {
    pub fn new() -> Self {
        DriverRuntime {
            port: DEFAULT_PORT,
            run_id: Uuid::new_v4(),
            config: RunConfig::new(1),
        }
    }

    /// Use the default CLI arguments for the driver.
    ///
    /// `-p`, `--port` to set a custom port number (default `7621`)
    ///
    /// `-w`, `--workers` for the number of workers expected to report (default `1`)
    ///
    /// `-t`, `--timeout` for how long to wait for reports, e.g. `90s` or `2m` (default `30s`)
    ///
    /// `-r`, `--run-id` to fix the run id workers must report under (default random)
    ///
    /// # Example
    /// ```ignore
    /// $ ./qps_driver -p 2742 -w 4 -t 2m
    /// ```
    pub fn with_args(mut self) -> Self {
        let args = DriverCli::parse();
        self.port = args.port;
        self.config.workers = args.workers;
        self.config.timeout = args.timeout.unwrap_or(DEFAULT_REPORT_TIMEOUT);
        if let Some(run_id) = args.run_id {
            self.run_id = run_id;
        }
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn params(mut self, params: HistogramParams) -> Self {
        self.config.params = params;
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Id workers have to put on their reports.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn run(self) -> Result<RunReport, RuntimeError> {
        let listener = bind(self.port).await?;
        self.run_on(listener).await
    }

    /// Like [`run`](Self::run), on an already bound listener.
    #[instrument(name = "qps-driver", skip_all, fields(run_id = %self.run_id))]
    pub async fn run_on(self, listener: TcpListener) -> Result<RunReport, RuntimeError> {
        let aggregator = Aggregator::with_worker_count(self.config.params, self.config.workers)?;
        let (tx, rx) = async_channel::bounded(REPORT_QUEUE);

        let server = tokio::spawn(server_task(listener, self.run_id, tx).in_current_span());

        info!(
            "Waiting up to {} for {} worker(s)",
            humantime::format_duration(self.config.timeout),
            self.config.workers
        );
        let report = collect(rx, aggregator, self.config.timeout).await;
        server.abort();

        if report.partial {
            error!("Run finished without {} worker(s)", report.missing_count());
        }
        info!("Run finished:\n{report}");

        Ok(report)
    }
}
