use super::{Ack, Message, StatsStream, TransportError, WorkerReport};
use async_channel::Sender;
use uuid::Uuid;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Driver side: read reports off `stream` until the worker hangs up, forwarding those of
/// run `run_id` into `reports` and answering each with an [`Ack`].
///
/// Returns the number of reports forwarded.
pub async fn receive_reports(
    stream: &mut impl StatsStream,
    run_id: Uuid,
    reports: &Sender<WorkerReport>,
) -> Result<usize, TransportError> {
    let mut forwarded = 0;

    while let Some(message) = stream.try_recv::<WorkerReport>().await {
        let report = message?.into_inner();
        let worker = report.worker;

        let ack = if report.run_id != run_id {
            error!("Rejecting report from {worker} for run {}", report.run_id);
            Ack::Rejected(format!("unknown run {}", report.run_id))
        } else if reports.send(report).await.is_err() {
            warn!("Report from {worker} arrived after the driver stopped collecting.");
            Ack::Rejected("driver is no longer collecting".to_string())
        } else {
            trace!("Forwarded report from {worker}");
            forwarded += 1;
            Ack::Accepted
        };

        stream.send(Message::new(ack)).await?;
    }

    debug!("Report stream closed after {forwarded} report(s)");
    Ok(forwarded)
}

/// Worker side: send one report and wait for the driver to acknowledge it.
///
/// `Ack::Accepted` means the report was queued for this run, not that it was merged. The
/// driver can still discard it afterwards (a histogram of another shape, a worker it does not
/// expect); that only shows up in the driver's log and its list of missing workers.
pub async fn send_report(
    stream: &mut impl StatsStream,
    report: WorkerReport,
) -> Result<(), TransportError> {
    stream.send(Message::new(report)).await?;
    let ack: Message<Ack> = stream.recv().await?;

    match ack.into_inner() {
        Ack::Accepted => Ok(()),
        Ack::Rejected(reason) => Err(TransportError::Rejected(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::FakeStream;
    use qps_core::{ClientStats, ServerStats, WorkerId};
    use tracing::Instrument;

    #[tokio::test]
    #[tracing_test::traced_test]
    #[ntest::timeout(1_000)]
    async fn reports_are_forwarded_and_acked() {
        let (mut driver, mut worker) = FakeStream::duplex();
        let (tx, rx) = async_channel::unbounded();
        let run_id = Uuid::new_v4();

        let handle = tokio::spawn(async move { receive_reports(&mut driver, run_id, &tx).await });

        send_report(
            &mut worker,
            WorkerReport::new(run_id, WorkerId(0), ClientStats::default()),
        )
        .await
        .unwrap();
        send_report(
            &mut worker,
            WorkerReport::new(run_id, WorkerId(1), ServerStats::default()),
        )
        .await
        .unwrap();
        drop(worker);

        assert_eq!(handle.await.unwrap().unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap().worker, WorkerId(0));
        assert_eq!(rx.recv().await.unwrap().worker, WorkerId(1));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    #[ntest::timeout(1_000)]
    async fn stale_run_is_rejected() {
        let (mut driver, mut worker) = FakeStream::duplex();
        let (tx, rx) = async_channel::unbounded();

        let handle = tokio::spawn(
            async move { receive_reports(&mut driver, Uuid::new_v4(), &tx).await }
                .in_current_span(),
        );

        let res = send_report(
            &mut worker,
            WorkerReport::new(Uuid::new_v4(), WorkerId(0), ClientStats::default()),
        )
        .await;
        assert!(matches!(res, Err(TransportError::Rejected(_))));
        drop(worker);

        assert_eq!(handle.await.unwrap().unwrap(), 0);
        assert!(rx.is_empty());
        assert!(logs_contain("Rejecting report from worker-0"));
    }

    #[tokio::test]
    #[ntest::timeout(1_000)]
    async fn closed_collector_rejects() {
        let (mut driver, mut worker) = FakeStream::duplex();
        let (tx, rx) = async_channel::unbounded();
        let run_id = Uuid::new_v4();
        rx.close();

        tokio::spawn(async move { receive_reports(&mut driver, run_id, &tx).await });

        let res = send_report(
            &mut worker,
            WorkerReport::new(run_id, WorkerId(0), ClientStats::default()),
        )
        .await;
        assert!(matches!(res, Err(TransportError::Rejected(_))));
    }
}
