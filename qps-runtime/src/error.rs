use crate::server::ServerError;
use crate::transport::TransportError;
use qps_core::StatsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid run configuration: {0}")]
    Config(#[from] StatsError),

    #[error("Driver server had an error: {0}")]
    Server(#[from] ServerError),

    #[error("Report transport had an error: {0}")]
    Transport(#[from] TransportError),
}
