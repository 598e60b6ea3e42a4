//! Transport seam between the job channel and the network.
//!
//! A [`Connector`] opens one duplex [`Connection`] per attempt. The
//! production implementation, [`WebSocketConnector`], uses
//! tokio-tungstenite; tests plug in an in-memory connector.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// A frame received from the server, with control frames stripped.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// The server asked to close the connection.
    Close,
}

/// Outbound half of a connection. Accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// A live duplex connection to a job's event stream.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections to a resolved endpoint URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

/// [`Connector`] backed by a real WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connection(format!("Failed to connect to {url}: {e}")))?;

        tracing::debug!(url, "WebSocket handshake complete");

        let (sink, stream) = ws_stream.split();

        let sink = sink
            .sink_map_err(|e| TransportError::Protocol(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

        // Ping/Pong are answered by tungstenite itself.
        let stream = stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.to_string()))),
                Ok(Message::Binary(data)) => Some(Ok(Frame::Binary(data.to_vec()))),
                Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Err(e) => Some(Err(TransportError::Protocol(e.to_string()))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Errors raised by a transport. Never surfaced to channel callers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connect step did not finish within the configured limit.
    #[error("Connect timed out after {0:?}")]
    Timeout(std::time::Duration),
}
