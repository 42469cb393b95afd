//! Driver-side report collection
//!
//! Reports from every connection funnel into one queue. A single task drains it into the
//! [`Aggregator`], so merging never races.
use crate::transport::WorkerReport;
use async_channel::Receiver;
use qps_core::{Aggregator, RunReport};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Merge queued reports until every expected worker has reported, the queue closes or `timeout`
/// runs out, whichever comes first. Whatever arrived by then is reported; missing workers are
/// listed in the result.
#[instrument(name = "collect", skip_all, fields(workers = aggregator.missing().len()))]
pub async fn collect(
    reports: Receiver<WorkerReport>,
    mut aggregator: Aggregator,
    timeout: Duration,
) -> RunReport {
    let deadline = Instant::now() + timeout;

    while !aggregator.is_complete() {
        match timeout_at(deadline, reports.recv()).await {
            Ok(Ok(WorkerReport { worker, stats, .. })) => {
                if let Err(err) = aggregator.add(worker, stats) {
                    error!("Discarding report from {worker}: {err}");
                } else {
                    debug!("Merged report from {worker}");
                }
            }
            Ok(Err(_)) => {
                warn!("Report queue closed before every worker reported.");
                break;
            }
            Err(_) => {
                warn!(
                    "Timed out after {} waiting for {} worker(s).",
                    humantime::format_duration(timeout),
                    aggregator.missing().len()
                );
                break;
            }
        }
    }

    reports.close();
    aggregator.close();
    aggregator.finalize()
}
