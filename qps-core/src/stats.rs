use crate::{HistogramData, RequestResults};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a benchmark worker, assigned by the driver.
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// CPU time consumed by a process, in seconds. Measuring it is left to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
}

/// Snapshot of a load-generating worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientStats {
    pub latencies: HistogramData,
    pub time_elapsed: f64,
    pub time_user: f64,
    pub time_system: f64,
    pub request_results: RequestResults,
    pub cq_poll_count: u64,
}

/// Snapshot of a server under test.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    pub time_elapsed: f64,
    pub time_user: f64,
    pub time_system: f64,
    pub total_cpu_time: u64,
    pub idle_cpu_time: u64,
    pub cq_poll_count: u64,
}

/// Either kind of worker snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Stats {
    Client(ClientStats),
    Server(ServerStats),
}

impl From<ClientStats> for Stats {
    fn from(stats: ClientStats) -> Self {
        Stats::Client(stats)
    }
}

impl From<ServerStats> for Stats {
    fn from(stats: ServerStats) -> Self {
        Stats::Server(stats)
    }
}

/// Merged statistics of one benchmark run, produced by the driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub latencies: HistogramData,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p95: Duration,
    pub latency_p99: Duration,
    pub latency_p999: Duration,
    pub latency_mean: Duration,
    pub latency_stddev: Duration,

    pub request_results: RequestResults,
    pub qps: f64,
    pub successful_requests_per_second: f64,
    pub failed_requests_per_second: f64,

    /// Mean wall time across reporting clients, in seconds.
    pub client_wall_time: f64,
    pub client_user_time: f64,
    pub client_system_time: f64,
    pub server_user_time: f64,
    pub server_system_time: f64,
    /// Percentage of server CPU that was busy, or `None` without CPU counters.
    pub server_cpu_usage: Option<f64>,
    pub cq_poll_count: u64,
    pub cq_polls_per_request: f64,

    pub clients_reported: usize,
    pub servers_reported: usize,
    pub missing_workers: Vec<WorkerId>,
    pub partial: bool,
}

impl RunReport {
    pub fn missing_count(&self) -> usize {
        self.missing_workers.len()
    }

    pub fn total_requests(&self) -> u64 {
        self.latencies.count.round() as u64
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "QPS={:.2} (ok={:.2}/s, failed={:.2}/s), p50={:?}, p90={:?}, p95={:?}, p99={:?}, p99.9={:?}",
            self.qps,
            self.successful_requests_per_second,
            self.failed_requests_per_second,
            self.latency_p50,
            self.latency_p90,
            self.latency_p95,
            self.latency_p99,
            self.latency_p999,
        )?;
        write!(
            f,
            "clients={}, servers={}, client sys/usr={:.2}%/{:.2}%, server sys/usr={:.2}%/{:.2}%",
            self.clients_reported,
            self.servers_reported,
            self.client_system_time,
            self.client_user_time,
            self.server_system_time,
            self.server_user_time,
        )?;
        if let Some(usage) = self.server_cpu_usage {
            write!(f, ", server cpu={usage:.2}%")?;
        }
        for (status, count) in self.request_results.iter() {
            write!(f, "\n  {status}: {count}")?;
        }
        if self.partial {
            write!(f, "\nPARTIAL: {} worker(s) never reported", self.missing_count())?;
        }
        Ok(())
    }
}
