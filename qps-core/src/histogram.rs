//! Exponential latency histogram
//!
//! Buckets grow geometrically by `1 + resolution`, so a histogram covering nanoseconds up to a
//! minute at 1% resolution needs ~2500 counters regardless of how many samples are recorded.
//! Recording is O(1): the bucket index is computed with a logarithm rather than a scan.
use crate::{HistogramParams, StatsError};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Point-in-time copy of a [`Histogram`], as carried on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramData {
    pub bucket: Vec<u32>,
    pub min_seen: f64,
    pub max_seen: f64,
    pub sum: f64,
    pub sum_of_squares: f64,
    pub count: f64,
}

impl HistogramData {
    pub fn num_buckets(&self) -> usize {
        self.bucket.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0.
    }
}

/// Single-owner latency accumulator.
///
/// There is no internal locking; `record` takes `&mut self`. Share one across tasks through
/// a mutex (see `qps::SharedHistogram`) or merge per-task histograms with [`Histogram::merge`].
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    params: HistogramParams,
    multiplier: f64,
    one_on_log_multiplier: f64,
    buckets: Vec<u32>,
    min_seen: f64,
    max_seen: f64,
    sum: f64,
    sum_of_squares: f64,
    count: u64,
}

impl Histogram {
    pub fn new(params: HistogramParams) -> Result<Self, StatsError> {
        params.validate()?;

        let multiplier = params.multiplier();
        let one_on_log_multiplier = 1. / multiplier.ln();
        let num_buckets = params.num_buckets();

        trace!("Histogram with {num_buckets} buckets for {params:?}");

        Ok(Self {
            params,
            multiplier,
            one_on_log_multiplier,
            buckets: vec![0; num_buckets],
            min_seen: params.max_possible,
            max_seen: 0.,
            sum: 0.,
            sum_of_squares: 0.,
            count: 0,
        })
    }

    /// Rebuild a histogram from a snapshot taken with the same `params`.
    pub fn from_data(params: HistogramParams, data: &HistogramData) -> Result<Self, StatsError> {
        let mut histogram = Self::new(params)?;
        histogram.merge(data)?;
        Ok(histogram)
    }

    /// Record one sample.
    ///
    /// Samples at or above `max_possible` are counted in the last bucket; they still
    /// contribute to `sum`, `count` and `max_seen`.
    pub fn record(&mut self, value: f64) -> Result<(), StatsError> {
        // NOTE: `!(value >= 0.)` also catches NaN
        if !(value >= 0.) {
            return Err(StatsError::Range(value));
        }

        self.sum += value;
        self.sum_of_squares += value * value;
        self.count += 1;
        self.min_seen = self.min_seen.min(value);
        self.max_seen = self.max_seen.max(value);

        let idx = self.bucket_index(value);
        self.buckets[idx] = self.buckets[idx].saturating_add(1);

        Ok(())
    }

    /// Index of the bucket `value` falls into. Values below 1 (including 0) land in bucket 0,
    /// values above `max_possible` in the last bucket.
    pub fn bucket_index(&self, value: f64) -> usize {
        let clamped = value.max(1.).min(self.params.max_possible);
        bucket_for_unchecked(clamped, self.one_on_log_multiplier).min(self.buckets.len() - 1)
    }

    /// Lower boundary of bucket `idx`.
    pub fn bucket_start(&self, idx: usize) -> f64 {
        self.multiplier.powf(idx as f64)
    }

    // Bucket 0 also holds everything in [0, 1)
    fn lower_bound(&self, idx: usize) -> f64 {
        if idx == 0 {
            0.
        } else {
            self.bucket_start(idx)
        }
    }

    pub fn snapshot(&self) -> HistogramData {
        HistogramData {
            bucket: self.buckets.clone(),
            min_seen: self.min_seen,
            max_seen: self.max_seen,
            sum: self.sum,
            sum_of_squares: self.sum_of_squares,
            count: self.count as f64,
        }
    }

    /// Fold a snapshot from another histogram into this one.
    ///
    /// Fails without modifying `self` if the bucket layouts differ.
    pub fn merge(&mut self, other: &HistogramData) -> Result<(), StatsError> {
        if other.bucket.len() != self.buckets.len() {
            return Err(StatsError::Shape {
                expected: self.buckets.len(),
                found: other.bucket.len(),
            });
        }

        for (mine, theirs) in self.buckets.iter_mut().zip(other.bucket.iter()) {
            *mine = mine.saturating_add(*theirs);
        }

        self.count += other.count.round() as u64;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
        self.min_seen = self.min_seen.min(other.min_seen);
        self.max_seen = self.max_seen.max(other.max_seen);

        Ok(())
    }

    pub fn merge_histogram(&mut self, other: &Histogram) -> Result<(), StatsError> {
        self.merge(&other.snapshot())
    }

    /// Estimate the `p`th percentile, `p` in `[0, 100]`.
    ///
    /// This is an approximation: samples are assumed to be spread uniformly within a bucket,
    /// so the relative error is bounded by the bucket width (roughly `resolution`). An empty
    /// histogram reports 0.
    pub fn percentile(&self, p: f64) -> f64 {
        let p = if p.is_nan() { 0. } else { p.clamp(0., 100.) };
        self.threshold_for_count_below(self.count as f64 * p / 100.)
    }

    fn threshold_for_count_below(&self, count_below: f64) -> f64 {
        if self.count == 0 {
            return 0.;
        }
        if count_below <= 0. {
            return self.min_seen;
        }
        if count_below >= self.count as f64 {
            return self.max_seen;
        }

        let mut count_so_far = 0.;
        let mut lower_idx = 0;
        for (idx, bucket) in self.buckets.iter().enumerate() {
            lower_idx = idx;
            count_so_far += *bucket as f64;
            if count_so_far >= count_below {
                break;
            }
        }

        if count_so_far == count_below {
            // The threshold sits exactly on a bucket edge, so answer from the middle of any
            // run of empty buckets that follows.
            let upper_idx = self.buckets[lower_idx + 1..]
                .iter()
                .position(|b| *b > 0)
                .map(|offset| lower_idx + 1 + offset)
                .unwrap_or(self.buckets.len());
            let estimate = (self.lower_bound(lower_idx) + self.bucket_start(upper_idx)) / 2.;
            estimate.max(self.min_seen).min(self.max_seen)
        } else {
            let lower_bound = self.lower_bound(lower_idx);
            let upper_bound = self.bucket_start(lower_idx + 1);
            let in_bucket = self.buckets[lower_idx] as f64;
            let estimate = upper_bound
                - (upper_bound - lower_bound) * (count_so_far - count_below) / in_bucket;
            estimate.max(self.min_seen).min(self.max_seen)
        }
    }

    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(|b| *b = 0);
        self.min_seen = self.params.max_possible;
        self.max_seen = 0.;
        self.sum = 0.;
        self.sum_of_squares = 0.;
        self.count = 0;
    }

    pub fn params(&self) -> HistogramParams {
        self.params
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[u32] {
        &self.buckets
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.sum_of_squares
    }

    pub fn min_seen(&self) -> f64 {
        self.min_seen
    }

    pub fn max_seen(&self) -> f64 {
        self.max_seen
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.;
        }
        let count = self.count as f64;
        // Rounding can push this slightly negative for constant inputs
        ((self.sum_of_squares * count - self.sum * self.sum) / (count * count)).max(0.)
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

fn bucket_for_unchecked(value: f64, one_on_log_multiplier: f64) -> usize {
    (value.ln() * one_on_log_multiplier).floor() as usize
}
