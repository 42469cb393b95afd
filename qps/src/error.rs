use qps_core::StatsError;
use std::sync::PoisonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Recorder mutex is poisoned.")]
    PoisonData,
}

impl<T> From<PoisonError<T>> for WorkerError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}
