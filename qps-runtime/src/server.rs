use crate::transport::{receive_reports, WorkerReport};
use async_channel::Sender;
use axum::{
    extract::{
        connect_info::ConnectInfo,
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Address Parsing Error")]
    AddrParseError(#[from] std::net::AddrParseError),

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

pub(crate) async fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let socket_addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    Ok(TcpListener::bind(socket_addr).await?)
}

/// Serve the `/ws` report endpoint, forwarding reports of run `run_id` into `reports`.
pub(crate) async fn server_task(
    listener: TcpListener,
    run_id: Uuid,
    reports: Sender<WorkerReport>,
) -> Result<(), ServerError> {
    let state = ServerState { run_id, reports };

    let app = Router::new()
        .route("/ws", get(ws))
        .with_state(Arc::new(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .into_make_service_with_connect_info::<SocketAddr>();

    debug!("Axum server starting up...");
    axum::serve(listener, app).await?;

    Ok(())
}

struct ServerState {
    run_id: Uuid,
    reports: Sender<WorkerReport>,
}

async fn ws(
    State(state): State<Arc<ServerState>>,
    connection_info: ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state, connection_info.0))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>, addr: SocketAddr) {
    debug!("Worker connected from {addr}");
    let res = receive_reports(&mut socket, state.run_id, &state.reports).await;
    if let Err(err) = res {
        error!("Error receiving reports from {addr}: {err:?}");
    }
}
