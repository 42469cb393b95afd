//! Worker-side reporting to a driver
use crate::transport::{send_report, TransportError, WorkerReport};
use qps_core::{Stats, WorkerId};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;
use uuid::Uuid;

/// A worker's connection to the driver's report endpoint.
pub struct ReportClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    run_id: Uuid,
    worker: WorkerId,
}

impl ReportClient {
    pub async fn connect(
        driver: SocketAddr,
        run_id: Uuid,
        worker: WorkerId,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(&format!("ws://{driver}/ws"))?;
        let (stream, _) = connect_async(url).await?;
        debug!("{worker} connected to driver at {driver}");

        Ok(Self {
            stream,
            run_id,
            worker,
        })
    }

    /// Send a snapshot and wait for the driver to accept it. A later snapshot replaces an
    /// earlier one on the driver.
    pub async fn report(&mut self, stats: impl Into<Stats>) -> Result<(), TransportError> {
        let report = WorkerReport::new(self.run_id, self.worker, stats);
        send_report(&mut self.stream, report).await?;
        trace!("{} report accepted", self.worker);
        Ok(())
    }

    pub async fn close(mut self) -> Result<(), TransportError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Connect, send a single snapshot and hang up.
#[instrument(skip(stats))]
pub async fn report_stats(
    driver: SocketAddr,
    run_id: Uuid,
    worker: WorkerId,
    stats: impl Into<Stats>,
) -> Result<(), TransportError> {
    let mut client = ReportClient::connect(driver, run_id, worker).await?;
    client.report(stats).await?;
    client.close().await
}
