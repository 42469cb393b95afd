use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid WebSocket message type")]
    InvalidType,

    #[error("Error in Axum: {0}")]
    Axum(#[from] axum::Error),

    #[error("Error in Tungstenite: {0}")]
    Tungstenite(#[from] tungstenite::Error),

    #[error("Error deserializing with Bincode: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("Stream ended too early")]
    NoData,

    #[error("Error in parsing driver URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Driver rejected report: {0}")]
    Rejected(String),
}
