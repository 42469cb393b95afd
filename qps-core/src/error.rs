use crate::WorkerId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("Invalid histogram configuration: {0}")]
    Config(String),

    #[error("Latency sample out of range: {0}")]
    Range(f64),

    #[error("Histogram shape mismatch: expected {expected} buckets, found {found}")]
    Shape { expected: usize, found: usize },

    #[error("Report from unknown worker {0}")]
    UnknownWorker(WorkerId),

    #[error("Aggregator is no longer collecting reports")]
    Closed,
}
