use std::time::Duration;

/// Default relative bucket width: each bucket is 1% wider than the previous one.
pub const DEFAULT_RESOLUTION: f64 = 0.01;

/// Default upper bound on a recordable latency: 60 seconds, in nanoseconds.
pub const DEFAULT_MAX_POSSIBLE: f64 = 60e9;

/// How long the driver waits for every worker to report before finalizing.
pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest bucket count a [`HistogramParams`](crate::HistogramParams) may ask for.
pub const MAX_BUCKETS: usize = 1 << 20;
