mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use qps::prelude::*;
    use qps_runtime::client::ReportClient;
    use qps_runtime::transport::TransportError;
    use rand::{rngs::SmallRng, Rng, SeedableRng};
    use rand_distr::{Distribution, LogNormal};
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Debug)]
    struct Unavailable;

    impl AsStatus for Unavailable {
        fn status(&self) -> Status {
            Status::UNAVAILABLE
        }
    }

    #[rpc]
    async fn unary_call(latency: Duration, fail: bool) -> Result<(), Unavailable> {
        tokio::time::sleep(latency).await;
        if fail {
            Err(Unavailable)
        } else {
            Ok(())
        }
    }

    /// Run `calls` RPCs on `tasks` concurrent tasks of `worker`; one in ten fails.
    async fn drive(worker: &Worker, tasks: usize, calls: usize, seed: u64) {
        let handles: Vec<_> = (0..tasks)
            .map(|t| {
                let mut rng = SmallRng::seed_from_u64(seed + t as u64);
                let dist = LogNormal::new(0., 0.5).unwrap();
                worker.spawn(async move {
                    for _ in 0..calls {
                        let latency = Duration::from_micros((200. * dist.sample(&mut rng)) as u64);
                        let fail = rng.gen_range(0..10) == 0;
                        let _ = unary_call(latency, fail).await;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn full_run() {
        init();

        let run_id = Uuid::new_v4();
        let (addr, driver) = spawn_driver(
            DriverRuntime::new()
                .workers(2)
                .timeout(Duration::from_secs(5))
                .with_run_id(run_id),
        )
        .await;

        let mut expected_ok = 0;
        let mut expected_failed = 0;
        for id in 0..2 {
            let worker = Worker::new(WorkerId(id), HistogramParams::default()).unwrap();
            drive(&worker, 4, 25, id as u64 * 100).await;

            let stats = worker.client_stats(true).unwrap();
            expected_ok += stats.request_results.successes();
            expected_failed += stats.request_results.failures();
            report_stats(addr, run_id, worker.id(), stats).await.unwrap();
        }

        let report = driver.await.unwrap().unwrap();
        assert!(!report.partial);
        assert_eq!(report.clients_reported, 2);
        assert_eq!(report.total_requests(), 200);
        assert_eq!(report.request_results.successes(), expected_ok);
        assert_eq!(
            report.request_results.get(Status::UNAVAILABLE.code()),
            expected_failed
        );
        assert!(report.latency_p50 >= Duration::from_micros(50));
        assert!(report.latency_p50 <= report.latency_p999);
        assert!(report.qps > 0.);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn partial_run_after_timeout() {
        init();

        let run_id = Uuid::new_v4();
        let (addr, driver) = spawn_driver(
            DriverRuntime::new()
                .workers(3)
                .timeout(Duration::from_millis(500))
                .with_run_id(run_id),
        )
        .await;

        for id in [0, 2] {
            let worker = Worker::new(WorkerId(id), HistogramParams::default()).unwrap();
            drive(&worker, 2, 10, id as u64).await;
            report_stats(addr, run_id, worker.id(), worker.client_stats(false).unwrap())
                .await
                .unwrap();
        }

        let report = driver.await.unwrap().unwrap();
        assert!(report.partial);
        assert_eq!(report.missing_workers, vec![WorkerId(1)]);
        assert_eq!(report.clients_reported, 2);
        assert_eq!(report.latencies.count, 40.);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn newer_snapshot_replaces_older() {
        init();

        let run_id = Uuid::new_v4();
        let (addr, driver) = spawn_driver(
            DriverRuntime::new()
                .workers(2)
                .timeout(Duration::from_millis(500))
                .with_run_id(run_id),
        )
        .await;

        let worker = Worker::new(WorkerId(1), HistogramParams::default()).unwrap();
        let mut client = ReportClient::connect(addr, run_id, worker.id())
            .await
            .unwrap();

        drive(&worker, 1, 5, 7).await;
        client.report(worker.client_stats(false).unwrap()).await.unwrap();
        drive(&worker, 1, 5, 8).await;
        client.report(worker.client_stats(false).unwrap()).await.unwrap();
        client.close().await.unwrap();

        let report = driver.await.unwrap().unwrap();
        assert!(report.partial);
        assert_eq!(report.latencies.count, 10.);
        assert_eq!(report.total_requests(), 10);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn stale_run_is_rejected() {
        init();

        let (addr, driver) = spawn_driver(
            DriverRuntime::new()
                .workers(1)
                .timeout(Duration::from_millis(300)),
        )
        .await;

        let res = report_stats(addr, Uuid::new_v4(), WorkerId(0), ClientStats::default()).await;
        assert!(matches!(res, Err(TransportError::Rejected(_))));

        let report = driver.await.unwrap().unwrap();
        assert!(report.partial);
        assert_eq!(report.clients_reported, 0);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn server_stats_are_reported() {
        init();

        let run_id = Uuid::new_v4();
        let (addr, driver) = spawn_driver(
            DriverRuntime::new()
                .workers(2)
                .timeout(Duration::from_secs(5))
                .with_run_id(run_id),
        )
        .await;

        let worker = Worker::new(WorkerId(0), HistogramParams::default()).unwrap();
        drive(&worker, 2, 10, 3).await;
        report_stats(addr, run_id, worker.id(), worker.client_stats(true).unwrap())
            .await
            .unwrap();

        let server = ServerStats {
            time_elapsed: 2.,
            time_user: 1.,
            time_system: 0.5,
            total_cpu_time: 400,
            idle_cpu_time: 100,
            cq_poll_count: 12,
        };
        report_stats(addr, run_id, WorkerId(1), server).await.unwrap();

        let report = driver.await.unwrap().unwrap();
        assert!(!report.partial);
        assert_eq!(report.servers_reported, 1);
        assert_eq!(report.server_cpu_usage, Some(75.));
        assert_eq!(report.server_user_time, 50.);
        assert_eq!(report.cq_poll_count, 12);
    }
}
