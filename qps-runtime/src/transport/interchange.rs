use super::{message::Message, TransportError};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte-level duplex the report protocol runs over.
///
/// `recv_bytes` returns `None` once the peer has closed the stream.
pub trait StatsStream {
    async fn recv_bytes(&mut self) -> Option<Result<Vec<u8>, TransportError>>;
    async fn send_bytes(&mut self, bytes: Vec<u8>) -> Result<(), TransportError>;

    async fn try_recv<M: for<'a> Deserialize<'a>>(
        &mut self,
    ) -> Option<Result<Message<M>, TransportError>> {
        let bytes = self.recv_bytes().await?;

        Some(match bytes {
            Ok(bytes) => Message::from_bytes(&bytes),
            Err(err) => Err(err),
        })
    }

    async fn recv<M: for<'a> Deserialize<'a>>(&mut self) -> Result<Message<M>, TransportError> {
        if let Some(res) = self.try_recv().await {
            res
        } else {
            Err(TransportError::NoData)
        }
    }

    async fn send<M: Serialize>(&mut self, message: Message<M>) -> Result<(), TransportError> {
        let bytes = message.to_bytes()?;
        self.send_bytes(bytes).await
    }
}

impl StatsStream for axum::extract::ws::WebSocket {
    async fn recv_bytes(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        use axum::extract::ws::Message as AxumMessage;
        loop {
            let message = self.recv().await?;
            return Some(match message {
                Ok(AxumMessage::Binary(bytes)) => Ok(bytes),
                Ok(AxumMessage::Close(_)) => return None,
                Ok(AxumMessage::Ping(_)) | Ok(AxumMessage::Pong(_)) => continue,
                Ok(_) => Err(TransportError::InvalidType),
                Err(err) => Err(TransportError::from(err)),
            });
        }
    }

    async fn send_bytes(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        use axum::extract::ws::Message as AxumMessage;
        self.send(AxumMessage::Binary(bytes)).await?;
        Ok(())
    }
}

impl<T> StatsStream for tokio_tungstenite::WebSocketStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn recv_bytes(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        use tungstenite::protocol::Message as TMessage;
        loop {
            let message = self.next().await?;
            return Some(match message {
                Ok(TMessage::Binary(bytes)) => Ok(bytes),
                Ok(TMessage::Close(_)) => return None,
                Ok(TMessage::Ping(_)) | Ok(TMessage::Pong(_)) => continue,
                Ok(_) => Err(TransportError::InvalidType),
                Err(err) => Err(TransportError::from(err)),
            });
        }
    }

    async fn send_bytes(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        use tungstenite::protocol::Message as TMessage;
        <Self as SinkExt<TMessage>>::send(self, TMessage::Binary(bytes)).await?;
        Ok(())
    }
}
