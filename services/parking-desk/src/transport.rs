//! Push channel transport
//!
//! The sync client speaks in text frames; these traits keep it independent of
//! the WebSocket library so sessions can be driven by mocks in tests.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::DeskError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reader and writer halves of one push channel connection
pub struct ConnectionPair {
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
}

/// Receives text frames
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait FrameReader: Send {
    /// `Ok(None)` once the peer has closed the connection
    async fn read_frame(&mut self) -> crate::Result<Option<String>>;
}

/// Sends text frames
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait FrameWriter: Send {
    async fn write_frame(&mut self, frame: &str) -> crate::Result<()>;

    async fn close(&mut self) -> crate::Result<()>;
}

/// Opens push channel connections
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, url: &str, timeout: Duration) -> crate::Result<ConnectionPair>;
}

pub struct WebSocketReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WebSocketReader {
    async fn read_frame(&mut self) -> crate::Result<Option<String>> {
        while let Some(message) = self.stream.next().await {
            match message.map_err(|e| DeskError::ConnectionFailed(e.to_string()))? {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Close(frame) => {
                    debug!("WebSocket closed by peer: {:?}", frame);
                    return Ok(None);
                }
                // Engine.IO heartbeats travel as text; control frames are answered by tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                Message::Binary(data) => {
                    debug!("Ignoring {} byte binary frame", data.len());
                    continue;
                }
            }
        }
        Ok(None)
    }
}

pub struct WebSocketWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for WebSocketWriter {
    async fn write_frame(&mut self, frame: &str) -> crate::Result<()> {
        self.sink
            .send(Message::text(frame.to_owned()))
            .await
            .map_err(|e| DeskError::ConnectionFailed(format!("send failed: {}", e)))
    }

    async fn close(&mut self) -> crate::Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| DeskError::ConnectionFailed(format!("close failed: {}", e)))
    }
}

/// [`ConnectionFactory`] over `tokio-tungstenite`
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnectionFactory;

impl WebSocketConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for WebSocketConnectionFactory {
    async fn connect(&self, url: &str, timeout: Duration) -> crate::Result<ConnectionPair> {
        debug!("Connecting to {} with timeout {:?}", url, timeout);

        let (stream, response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| DeskError::Timeout(format!("Connection to {} timed out", url)))?
            .map_err(|e| DeskError::ConnectionFailed(format!("Failed to connect to {}: {}", url, e)))?;

        debug!("WebSocket established to {} ({})", url, response.status());

        let (sink, stream) = stream.split();
        Ok(ConnectionPair {
            reader: Box::new(WebSocketReader { stream }),
            writer: Box::new(WebSocketWriter { sink }),
        })
    }
}
