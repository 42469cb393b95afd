//! Driver-side merging of worker snapshots
//!
//! Workers send cumulative snapshots, so a later report from the same worker supersedes its
//! earlier one instead of being added on top of it.
use crate::{
    ClientStats, Histogram, HistogramParams, RequestResults, RunReport, ServerStats, Stats,
    StatsError, WorkerId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AggregatorState {
    Collecting,
    Finalizing,
}

#[derive(Debug, Clone, Default)]
struct Totals {
    client_time_elapsed: f64,
    client_time_user: f64,
    client_time_system: f64,
    server_time_elapsed: f64,
    server_time_user: f64,
    server_time_system: f64,
    cq_poll_count: u64,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    state: AggregatorState,
    expected: BTreeSet<WorkerId>,
    clients: BTreeMap<WorkerId, ClientStats>,
    servers: BTreeMap<WorkerId, ServerStats>,
    merged: Histogram,
    results: RequestResults,
    totals: Totals,
}

impl Aggregator {
    pub fn new(
        params: HistogramParams,
        expected: impl IntoIterator<Item = WorkerId>,
    ) -> Result<Self, StatsError> {
        Ok(Self {
            state: AggregatorState::Collecting,
            expected: expected.into_iter().collect(),
            clients: BTreeMap::new(),
            servers: BTreeMap::new(),
            merged: Histogram::new(params)?,
            results: RequestResults::new(),
            totals: Totals::default(),
        })
    }

    /// Aggregator expecting workers `0..workers`.
    pub fn with_worker_count(params: HistogramParams, workers: usize) -> Result<Self, StatsError> {
        Self::new(params, (0..workers as u32).map(WorkerId))
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn add(&mut self, worker: WorkerId, stats: Stats) -> Result<(), StatsError> {
        match stats {
            Stats::Client(stats) => self.add_client_stats(worker, stats),
            Stats::Server(stats) => self.add_server_stats(worker, stats),
        }
    }

    pub fn add_client_stats(
        &mut self,
        worker: WorkerId,
        stats: ClientStats,
    ) -> Result<(), StatsError> {
        self.check_accepting(worker)?;

        let found = stats.latencies.num_buckets();
        if found != self.merged.num_buckets() {
            error!("{worker} reported a histogram with {found} buckets; discarding.");
            return Err(StatsError::Shape {
                expected: self.merged.num_buckets(),
                found,
            });
        }

        if self.clients.insert(worker, stats).is_some() {
            debug!("{worker} sent a newer snapshot, replacing its previous one.");
            self.rebuild()?;
        } else {
            let stats = &self.clients[&worker];
            self.merged.merge(&stats.latencies)?;
            self.results.merge(&stats.request_results);
            self.totals.client_time_elapsed += stats.time_elapsed;
            self.totals.client_time_user += stats.time_user;
            self.totals.client_time_system += stats.time_system;
            self.totals.cq_poll_count += stats.cq_poll_count;
        }

        trace!("Merged client stats from {worker}.");
        Ok(())
    }

    pub fn add_server_stats(
        &mut self,
        worker: WorkerId,
        stats: ServerStats,
    ) -> Result<(), StatsError> {
        self.check_accepting(worker)?;

        if self.servers.insert(worker, stats).is_some() {
            debug!("{worker} sent a newer snapshot, replacing its previous one.");
            self.rebuild()?;
        } else {
            let stats = &self.servers[&worker];
            self.totals.server_time_elapsed += stats.time_elapsed;
            self.totals.server_time_user += stats.time_user;
            self.totals.server_time_system += stats.time_system;
            self.totals.cq_poll_count += stats.cq_poll_count;
        }

        trace!("Merged server stats from {worker}.");
        Ok(())
    }

    fn check_accepting(&self, worker: WorkerId) -> Result<(), StatsError> {
        if self.state != AggregatorState::Collecting {
            return Err(StatsError::Closed);
        }
        if !self.expected.contains(&worker) {
            error!("Rejecting report from unexpected {worker}.");
            return Err(StatsError::UnknownWorker(worker));
        }
        Ok(())
    }

    fn rebuild(&mut self) -> Result<(), StatsError> {
        self.merged.clear();
        self.results.clear();
        self.totals = Totals::default();

        for stats in self.clients.values() {
            self.merged.merge(&stats.latencies)?;
            self.results.merge(&stats.request_results);
            self.totals.client_time_elapsed += stats.time_elapsed;
            self.totals.client_time_user += stats.time_user;
            self.totals.client_time_system += stats.time_system;
            self.totals.cq_poll_count += stats.cq_poll_count;
        }

        for stats in self.servers.values() {
            self.totals.server_time_elapsed += stats.time_elapsed;
            self.totals.server_time_user += stats.time_user;
            self.totals.server_time_system += stats.time_system;
            self.totals.cq_poll_count += stats.cq_poll_count;
        }

        Ok(())
    }

    pub fn has_reported(&self, worker: WorkerId) -> bool {
        self.clients.contains_key(&worker) || self.servers.contains_key(&worker)
    }

    pub fn reported(&self) -> BTreeSet<WorkerId> {
        self.clients
            .keys()
            .chain(self.servers.keys())
            .copied()
            .collect()
    }

    pub fn missing(&self) -> Vec<WorkerId> {
        self.expected
            .iter()
            .filter(|w| !self.has_reported(**w))
            .copied()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.expected.iter().all(|w| self.has_reported(*w))
    }

    /// The running merged latency histogram.
    pub fn histogram(&self) -> &Histogram {
        &self.merged
    }

    pub fn request_results(&self) -> &RequestResults {
        &self.results
    }

    /// Stop accepting reports.
    pub fn close(&mut self) {
        if self.state == AggregatorState::Collecting {
            debug!(
                "Closing aggregator with {}/{} workers reported.",
                self.reported().len(),
                self.expected.len()
            );
            self.state = AggregatorState::Finalizing;
        }
    }

    /// Produce the final report. Workers that never reported are listed, not treated as an error.
    pub fn finalize(mut self) -> RunReport {
        self.close();

        let missing_workers = self.missing();
        if !missing_workers.is_empty() {
            warn!(
                "{} worker(s) never reported: {missing_workers:?}",
                missing_workers.len()
            );
        }

        let totals = &self.totals;
        let clients = self.clients.len();
        let count = self.merged.count() as f64;

        let client_wall_time = ratio(totals.client_time_elapsed, clients as f64);

        // Without any request results every recorded latency counts as a success
        let (successes, failures) = if self.results.is_empty() {
            (count, 0.)
        } else {
            (
                self.results.successes() as f64,
                self.results.failures() as f64,
            )
        };

        let cpu_usages: Vec<f64> = self
            .servers
            .values()
            .filter(|s| s.total_cpu_time > 0)
            .map(|s| 100. - 100. * s.idle_cpu_time as f64 / s.total_cpu_time as f64)
            .collect();
        let server_cpu_usage = if cpu_usages.is_empty() {
            None
        } else {
            Some(cpu_usages.iter().sum::<f64>() / cpu_usages.len() as f64)
        };

        let h = &self.merged;
        RunReport {
            latencies: h.snapshot(),
            latency_p50: nanos(h.percentile(50.)),
            latency_p90: nanos(h.percentile(90.)),
            latency_p95: nanos(h.percentile(95.)),
            latency_p99: nanos(h.percentile(99.)),
            latency_p999: nanos(h.percentile(99.9)),
            latency_mean: nanos(h.mean()),
            latency_stddev: nanos(h.stddev()),

            request_results: self.results.clone(),
            qps: ratio(count, client_wall_time),
            successful_requests_per_second: ratio(successes, client_wall_time),
            failed_requests_per_second: ratio(failures, client_wall_time),

            client_wall_time,
            client_user_time: 100. * ratio(totals.client_time_user, totals.client_time_elapsed),
            client_system_time: 100.
                * ratio(totals.client_time_system, totals.client_time_elapsed),
            server_user_time: 100. * ratio(totals.server_time_user, totals.server_time_elapsed),
            server_system_time: 100.
                * ratio(totals.server_time_system, totals.server_time_elapsed),
            server_cpu_usage,
            cq_poll_count: totals.cq_poll_count,
            cq_polls_per_request: ratio(totals.cq_poll_count as f64, count),

            clients_reported: clients,
            servers_reported: self.servers.len(),
            partial: !missing_workers.is_empty(),
            missing_workers,
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0. {
        num / den
    } else {
        0.
    }
}

fn nanos(ns: f64) -> Duration {
    if ns.is_finite() && ns > 0. {
        Duration::from_nanos(ns.round() as u64)
    } else if ns == f64::INFINITY {
        Duration::MAX
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestResultCount, Status};

    fn client_stats(latencies: &[f64], results: &[(i32, i64)], elapsed: f64) -> ClientStats {
        let mut h = Histogram::new(HistogramParams::default()).unwrap();
        for l in latencies {
            h.record(*l).unwrap();
        }
        ClientStats {
            latencies: h.snapshot(),
            time_elapsed: elapsed,
            time_user: elapsed / 4.,
            time_system: elapsed / 10.,
            request_results: results
                .iter()
                .map(|(code, count)| RequestResultCount::new(*code, *count))
                .collect(),
            cq_poll_count: 10,
        }
    }

    fn aggregator(workers: usize) -> Aggregator {
        Aggregator::with_worker_count(HistogramParams::default(), workers).unwrap()
    }

    #[tracing_test::traced_test]
    #[test]
    fn partial_report() {
        let mut agg = aggregator(3);
        agg.add_client_stats(WorkerId(0), client_stats(&[1e6, 2e6], &[(0, 2)], 1.))
            .unwrap();
        agg.add_client_stats(WorkerId(2), client_stats(&[3e6], &[(0, 1)], 1.))
            .unwrap();
        assert!(!agg.is_complete());

        let report = agg.finalize();
        assert!(report.partial);
        assert_eq!(report.missing_count(), 1);
        assert_eq!(report.missing_workers, vec![WorkerId(1)]);
        assert_eq!(report.clients_reported, 2);
        assert_eq!(report.total_requests(), 3);
        assert_eq!(report.request_results.successes(), 3);
        assert!(logs_contain("never reported"));
    }

    #[test]
    fn complete_report() {
        let mut agg = aggregator(2);
        agg.add(
            WorkerId(0),
            client_stats(&[1e6; 90], &[(0, 90), (14, 10)], 2.).into(),
        )
        .unwrap();
        agg.add(
            WorkerId(1),
            client_stats(&[1e6; 110], &[(0, 110)], 2.).into(),
        )
        .unwrap();
        assert!(agg.is_complete());

        let report = agg.finalize();
        assert!(!report.partial);
        assert_eq!(report.client_wall_time, 2.);
        assert_eq!(report.qps, 100.);
        assert_eq!(report.successful_requests_per_second, 100.);
        assert_eq!(report.failed_requests_per_second, 5.);
        assert_eq!(report.request_results.get(Status::UNAVAILABLE.code()), 10);
        assert_eq!(report.latency_p50, Duration::from_millis(1));
        assert_eq!(report.cq_poll_count, 20);
        assert!((report.client_user_time - 25.).abs() < 1e-9);
        assert!((report.client_system_time - 10.).abs() < 1e-9);
    }

    #[test]
    fn newer_snapshot_replaces_older() {
        let mut agg = aggregator(1);
        agg.add_client_stats(WorkerId(0), client_stats(&[1e6; 5], &[(0, 5)], 1.))
            .unwrap();
        agg.add_client_stats(WorkerId(0), client_stats(&[1e6; 8], &[(0, 8)], 2.))
            .unwrap();

        assert_eq!(agg.histogram().count(), 8);
        assert_eq!(agg.request_results().successes(), 8);

        let report = agg.finalize();
        assert_eq!(report.client_wall_time, 2.);
        assert_eq!(report.qps, 4.);
    }

    #[test]
    fn rejects_unknown_worker() {
        let mut agg = aggregator(1);
        let err = agg
            .add_client_stats(WorkerId(7), client_stats(&[1.], &[], 1.))
            .unwrap_err();
        assert_eq!(err, StatsError::UnknownWorker(WorkerId(7)));
        assert!(agg.reported().is_empty());
    }

    #[test]
    fn shape_mismatch_is_not_merged() {
        let mut agg = aggregator(2);
        agg.add_client_stats(WorkerId(0), client_stats(&[1e3], &[(0, 1)], 1.))
            .unwrap();

        let mut other = Histogram::new(HistogramParams::new(0.1, 60e9)).unwrap();
        other.record(5.).unwrap();
        let stats = ClientStats {
            latencies: other.snapshot(),
            ..Default::default()
        };

        let err = agg.add_client_stats(WorkerId(1), stats).unwrap_err();
        assert!(matches!(err, StatsError::Shape { .. }));
        assert_eq!(agg.histogram().count(), 1);
        assert_eq!(agg.missing(), vec![WorkerId(1)]);
    }

    #[test]
    fn server_cpu_usage() {
        let mut agg = aggregator(3);
        agg.add_client_stats(WorkerId(0), client_stats(&[1e6], &[], 1.))
            .unwrap();
        agg.add_server_stats(
            WorkerId(1),
            ServerStats {
                time_elapsed: 2.,
                time_user: 1.,
                time_system: 0.5,
                total_cpu_time: 1000,
                idle_cpu_time: 250,
                cq_poll_count: 4,
            },
        )
        .unwrap();
        agg.add_server_stats(
            WorkerId(2),
            ServerStats {
                time_elapsed: 2.,
                time_user: 1.,
                time_system: 0.5,
                total_cpu_time: 1000,
                idle_cpu_time: 750,
                cq_poll_count: 6,
            },
        )
        .unwrap();

        let report = agg.finalize();
        assert_eq!(report.servers_reported, 2);
        assert_eq!(report.server_cpu_usage, Some(50.));
        assert_eq!(report.server_user_time, 50.);
        assert_eq!(report.server_system_time, 25.);
        assert_eq!(report.cq_poll_count, 20);
        assert_eq!(report.cq_polls_per_request, 20.);
    }

    #[test]
    fn closed_aggregator_rejects_reports() {
        let mut agg = aggregator(1);
        agg.close();
        assert_eq!(agg.state(), AggregatorState::Finalizing);
        let err = agg
            .add_client_stats(WorkerId(0), client_stats(&[1.], &[], 1.))
            .unwrap_err();
        assert_eq!(err, StatsError::Closed);
    }

    #[test]
    fn empty_run() {
        let report = aggregator(0).finalize();
        assert!(!report.partial);
        assert_eq!(report.qps, 0.);
        assert_eq!(report.latency_p99, Duration::ZERO);
        assert_eq!(report.server_cpu_usage, None);
    }
}
