use crate::{
    StatsError, DEFAULT_MAX_POSSIBLE, DEFAULT_REPORT_TIMEOUT, DEFAULT_RESOLUTION, MAX_BUCKETS,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

/// Bucket layout of a [`Histogram`](crate::Histogram).
///
/// `resolution` is the relative width of a bucket: every bucket boundary is `1 + resolution`
/// times the previous one. `max_possible` is the largest value the histogram distinguishes;
/// anything larger is counted in the last bucket. Together they may not ask for more than
/// [`MAX_BUCKETS`] buckets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramParams {
    pub resolution: f64,
    pub max_possible: f64,
}

impl HistogramParams {
    pub fn new(resolution: f64, max_possible: f64) -> Self {
        Self {
            resolution,
            max_possible,
        }
    }

    pub fn validate(&self) -> Result<(), StatsError> {
        if !(self.resolution.is_finite() && self.resolution > 0.) {
            return Err(StatsError::Config(format!(
                "resolution must be a finite value > 0, got {}",
                self.resolution
            )));
        }

        if !(self.max_possible.is_finite() && self.max_possible > 0.) {
            return Err(StatsError::Config(format!(
                "max_possible must be a finite value > 0, got {}",
                self.max_possible
            )));
        }

        // A resolution below f64 precision rounds the multiplier to exactly 1
        if !(self.multiplier() > 1.) {
            return Err(StatsError::Config(format!(
                "resolution {} is too small to tell buckets apart",
                self.resolution
            )));
        }

        let buckets = self.num_buckets();
        if buckets > MAX_BUCKETS {
            return Err(StatsError::Config(format!(
                "resolution {} up to {} needs {buckets} buckets, more than {MAX_BUCKETS}",
                self.resolution, self.max_possible
            )));
        }

        Ok(())
    }

    /// Bucket count of a histogram with these params, assuming a multiplier above 1.
    pub fn num_buckets(&self) -> usize {
        let last = (self.max_possible.ln() / self.multiplier().ln()).floor();
        if last.is_finite() {
            // Saturating cast; `max_possible` below 1 still gets one bucket
            (last as usize).saturating_add(1)
        } else {
            usize::MAX
        }
    }

    /// Growth factor between consecutive bucket boundaries.
    pub fn multiplier(&self) -> f64 {
        1. + self.resolution
    }
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION, DEFAULT_MAX_POSSIBLE)
    }
}

/// Driver-side configuration for a single benchmark run.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub workers: usize,
    #[serde_as(as = "DurationSeconds")]
    pub timeout: Duration,
    #[serde(default)]
    pub params: HistogramParams,
}

impl RunConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            timeout: DEFAULT_REPORT_TIMEOUT,
            params: HistogramParams::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn params(mut self, params: HistogramParams) -> Self {
        self.params = params;
        self
    }
}
