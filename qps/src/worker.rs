//! Worker-side recording
//!
//! A [`Worker`] owns the [`SharedHistogram`] its request tasks record into and turns it into
//! [`ClientStats`] snapshots for the driver.
use crate::measurement::Measurement;
use crate::recorder::{SharedHistogram, RPC_HOOK};
use crate::timer::Timer;
use crate::WorkerError;
use qps_core::{ClientStats, CpuTimes, HistogramParams, Status, StatsError, WorkerId};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

type CpuClock = Arc<dyn Fn() -> CpuTimes + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Mark {
    at: Instant,
    cpu: CpuTimes,
}

#[derive(Clone)]
pub struct Worker {
    id: WorkerId,
    recorder: SharedHistogram,
    mark: Arc<Mutex<Mark>>,
    cq_poll_count: Arc<AtomicU64>,
    cpu_clock: Option<CpuClock>,
}

impl Worker {
    pub fn new(id: WorkerId, params: HistogramParams) -> Result<Self, StatsError> {
        Ok(Self {
            id,
            recorder: SharedHistogram::new(params)?,
            mark: Arc::new(Mutex::new(Mark {
                at: Instant::now(),
                cpu: CpuTimes::default(),
            })),
            cq_poll_count: Arc::new(AtomicU64::new(0)),
            cpu_clock: None,
        })
    }

    /// Source of process CPU times, sampled on every snapshot. Without one, the user and
    /// system times of snapshots are reported as zero.
    pub fn with_cpu_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> CpuTimes + Send + Sync + 'static,
    {
        let cpu = clock();
        self.cpu_clock = Some(Arc::new(clock));
        if let Ok(mut mark) = self.mark.lock() {
            mark.cpu = cpu;
        }
        self
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn recorder(&self) -> &SharedHistogram {
        &self.recorder
    }

    /// Run `fut` with this worker's recorder installed, so every `#[rpc]` call inside it is
    /// recorded here.
    pub fn scope<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        RPC_HOOK.scope(self.recorder.clone(), fut)
    }

    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.scope(fut).in_current_span())
    }

    /// Record an RPC measured outside of the `#[rpc]` hook.
    pub fn record(&self, latency: Duration, status: Status) -> Result<(), WorkerError> {
        self.recorder.record(latency, status)
    }

    pub fn add_cq_polls(&self, polls: u64) {
        self.cq_poll_count.fetch_add(polls, Ordering::Relaxed);
    }

    /// Snapshot everything recorded since the worker started or was last reset.
    ///
    /// With `reset`, recording starts over after the snapshot, including the wall clock.
    pub fn client_stats(&self, reset: bool) -> Result<ClientStats, WorkerError> {
        let now = Instant::now();
        let cpu = self.cpu_clock.as_ref().map(|clock| clock()).unwrap_or_default();

        let mut mark = self.mark.lock()?;
        let (latencies, request_results) = self.recorder.snapshot(reset)?;
        let cq_poll_count = if reset {
            self.cq_poll_count.swap(0, Ordering::Relaxed)
        } else {
            self.cq_poll_count.load(Ordering::Relaxed)
        };

        let stats = ClientStats {
            latencies,
            time_elapsed: (now - mark.at).as_secs_f64(),
            time_user: cpu.user - mark.cpu.user,
            time_system: cpu.system - mark.cpu.system,
            request_results,
            cq_poll_count,
        };

        if reset {
            *mark = Mark { at: now, cpu };
        }

        trace!("{} snapshot with {} samples", self.id, stats.latencies.count);
        Ok(stats)
    }

    /// Push a cumulative snapshot into `tx` every `interval` until the receiving side is gone.
    pub async fn snapshot_task(
        self,
        interval: Duration,
        tx: async_channel::Sender<ClientStats>,
    ) -> Result<(), WorkerError> {
        let params = self.recorder.params()?;
        let mut timer = Timer::new(interval).await;
        debug!("{} snapshotting every {timer}", self.id);

        loop {
            timer.tick().await;
            let stats = self.client_stats(false)?;

            match Measurement::new(params, &stats) {
                Ok(measurement) => debug!("{}: {measurement}", self.id),
                Err(err) => error!("Unable to summarize snapshot: {err}"),
            }

            if tx.send(stats).await.is_err() {
                debug!("{} snapshot receiver closed; stopping.", self.id);
                return Ok(());
            }
        }
    }
}
