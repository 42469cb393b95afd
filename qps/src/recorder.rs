use crate::WorkerError;
use qps_core::{
    Histogram, HistogramData, HistogramParams, RequestResults, RpcLabels, Status, StatsError,
};
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// RPC hook used by the `#[rpc]` macro. Not intended to be used manually.
///
/// Times `func` and records its latency (in nanoseconds) and status into the recorder of the
/// enclosing [`Worker`](crate::Worker) scope.
pub async fn rpc_hook<T, R, E>(labels: RpcLabels, func: T) -> T::Output
where
    T: Future<Output = Result<R, E>>,
    E: AsStatus,
{
    if let Ok(hook) = RPC_HOOK.try_with(|v| v.clone()) {
        let start = Instant::now();
        let res = func.await;
        let elapsed = start.elapsed();

        let status = match &res {
            Ok(_) => Status::OK,
            Err(err) => err.status(),
        };

        #[cfg(feature = "metrics")]
        {
            metrics::histogram!(labels.latency).record(elapsed.as_nanos() as f64);
            if status.is_ok() {
                metrics::counter!(labels.success).increment(1);
            } else {
                metrics::counter!(labels.error).increment(1);
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = labels;

        if let Err(err) = hook.record(elapsed, status) {
            tracing::error!("Unable to record RPC: {err}");
        }

        res
    } else {
        tracing::error!("No recorder available.");
        func.await
    }
}

tokio::task_local! {
    pub(crate) static RPC_HOOK: SharedHistogram;
}

/// Maps an RPC error to the status code it is counted under.
pub trait AsStatus {
    fn status(&self) -> Status;
}

impl AsStatus for Status {
    fn status(&self) -> Status {
        *self
    }
}

impl AsStatus for i32 {
    fn status(&self) -> Status {
        Status(*self)
    }
}

impl AsStatus for () {
    fn status(&self) -> Status {
        Status::UNKNOWN
    }
}

impl AsStatus for io::Error {
    fn status(&self) -> Status {
        match self.kind() {
            io::ErrorKind::TimedOut => Status::DEADLINE_EXCEEDED,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => Status::UNAVAILABLE,
            io::ErrorKind::NotFound => Status::NOT_FOUND,
            io::ErrorKind::PermissionDenied => Status::PERMISSION_DENIED,
            io::ErrorKind::InvalidInput => Status::INVALID_ARGUMENT,
            _ => Status::UNKNOWN,
        }
    }
}

impl AsStatus for tokio::time::error::Elapsed {
    fn status(&self) -> Status {
        Status::DEADLINE_EXCEEDED
    }
}

#[derive(Debug)]
struct Recorded {
    histogram: Histogram,
    results: RequestResults,
}

/// A latency histogram and per-status counts shared by every request task of one worker.
///
/// `record` and `snapshot` take the same lock, so a snapshot never sees a sample counted in
/// the histogram but not in the results (or vice versa).
#[derive(Clone, Debug)]
pub struct SharedHistogram {
    inner: Arc<Mutex<Recorded>>,
}

impl SharedHistogram {
    pub fn new(params: HistogramParams) -> Result<Self, StatsError> {
        Ok(Self {
            inner: Arc::new(Mutex::new(Recorded {
                histogram: Histogram::new(params)?,
                results: RequestResults::new(),
            })),
        })
    }

    pub fn record(&self, latency: Duration, status: Status) -> Result<(), WorkerError> {
        self.record_value(latency.as_nanos() as f64, status)
    }

    pub fn record_value(&self, value: f64, status: Status) -> Result<(), WorkerError> {
        let mut inner = self.inner.lock()?;
        inner.histogram.record(value)?;
        inner.results.increment(status);
        Ok(())
    }

    /// Copy the current state. With `reset`, the recorder starts over afterwards.
    pub fn snapshot(&self, reset: bool) -> Result<(HistogramData, RequestResults), WorkerError> {
        let mut inner = self.inner.lock()?;
        let snapshot = (inner.histogram.snapshot(), inner.results.clone());
        if reset {
            inner.histogram.clear();
            inner.results.clear();
        }
        Ok(snapshot)
    }

    pub fn count(&self) -> Result<u64, WorkerError> {
        Ok(self.inner.lock()?.histogram.count())
    }

    pub fn params(&self) -> Result<HistogramParams, WorkerError> {
        Ok(self.inner.lock()?.histogram.params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Unavailable;

    impl AsStatus for Unavailable {
        fn status(&self) -> Status {
            Status::UNAVAILABLE
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hook_records_latency_and_status() {
        let recorder = SharedHistogram::new(HistogramParams::default()).unwrap();

        RPC_HOOK
            .scope(recorder.clone(), async {
                let res: Result<(), Unavailable> =
                    rpc_hook(RpcLabels::unlabeled(), async {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Ok(())
                    })
                    .await;
                assert!(res.is_ok());

                let res: Result<(), Unavailable> =
                    rpc_hook(RpcLabels::unlabeled(), async { Err(Unavailable) }).await;
                assert!(res.is_err());
            })
            .await;

        let (latencies, results) = recorder.snapshot(false).unwrap();
        assert_eq!(latencies.count, 2.);
        assert!(latencies.max_seen >= 5e6 && latencies.max_seen < 6e6);
        assert_eq!(results.successes(), 1);
        assert_eq!(results.get(Status::UNAVAILABLE.code()), 1);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn hook_without_recorder_passes_through() {
        let res: Result<u32, ()> = rpc_hook(RpcLabels::unlabeled(), async { Ok(7) }).await;
        assert_eq!(res, Ok(7));
        assert!(logs_contain("No recorder available."));
    }

    #[test]
    fn snapshot_with_reset() {
        let recorder = SharedHistogram::new(HistogramParams::default()).unwrap();
        recorder
            .record(Duration::from_micros(10), Status::OK)
            .unwrap();
        recorder
            .record(Duration::from_micros(20), Status::DEADLINE_EXCEEDED)
            .unwrap();

        let (latencies, results) = recorder.snapshot(true).unwrap();
        assert_eq!(latencies.count, 2.);
        assert_eq!(results.total(), 2);

        let (latencies, results) = recorder.snapshot(false).unwrap();
        assert!(latencies.is_empty());
        assert!(results.is_empty());
    }

    #[test]
    fn shared_across_threads() {
        let recorder = SharedHistogram::new(HistogramParams::default()).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        recorder.record_value(i as f64, Status::OK).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorder.count().unwrap(), 4_000);
        let (_, results) = recorder.snapshot(false).unwrap();
        assert_eq!(results.successes(), 4_000);
    }

    #[test]
    fn io_errors_map_to_status() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(err.status(), Status::UNAVAILABLE);
        let err = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(err.status(), Status::DEADLINE_EXCEEDED);
        assert_eq!(14i32.status(), Status::UNAVAILABLE);
    }
}
