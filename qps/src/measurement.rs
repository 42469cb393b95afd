use qps_core::{ClientStats, Histogram, HistogramParams, StatsError};
use std::fmt;
use std::time::Duration;

/// Local view of a single [`ClientStats`] snapshot, for progress logging on the worker.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub qps: f64,
    pub error_rate: f64,
    pub elapsed: Duration,
    latency: Histogram,
}

impl Measurement {
    pub fn new(params: HistogramParams, stats: &ClientStats) -> Result<Self, StatsError> {
        let latency = Histogram::from_data(params, &stats.latencies)?;

        let qps = if stats.time_elapsed > 0. {
            latency.count() as f64 / stats.time_elapsed
        } else {
            0.
        };

        let total = stats.request_results.total();
        let error_rate = if total > 0 {
            stats.request_results.failures() as f64 / total as f64
        } else {
            0.
        };

        Ok(Self {
            qps,
            error_rate,
            elapsed: Duration::from_secs_f64(stats.time_elapsed.max(0.)),
            latency,
        })
    }

    /// Latency at the `p`th percentile (`p` in `[0, 100]`).
    pub fn latency(&self, p: f64) -> Duration {
        let nanos = self.latency.percentile(p);
        Duration::from_nanos(nanos.min(u64::MAX as f64) as u64)
    }

    pub fn count(&self) -> u64 {
        self.latency.count()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QPS={:.2}, ErrorRate={:.2}, p50={:?}, p90={:?}, p99={:?}",
            self.qps,
            self.error_rate,
            self.latency(50.),
            self.latency(90.),
            self.latency(99.),
        )
    }
}
