//! WebSocket connector for real TVs

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::transport::{Connector, Frame, FrameSink, FrameStream};

/// Port the SSAP service listens on
pub const SSAP_PORT: u16 = 3000;

/// Connects to the SSAP endpoint of a TV at `ws://<host>:3000`
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Create a connector for the TV at `host`
    pub fn new(host: &str) -> Self {
        Self {
            url: format!("ws://{host}:{SSAP_PORT}"),
        }
    }

    /// Create a connector for an arbitrary WebSocket URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<(FrameSink, FrameStream)> {
        let (socket, _response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    url: self.url.clone(),
                    reason: e.to_string(),
                })?;

        debug!("WebSocket connected to {}", self.url);

        let (sink, stream) = socket.split();

        let sink = sink
            .sink_map_err(TransportError::from)
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(into_message(frame))));

        let stream = stream.filter_map(|item| {
            future::ready(match item {
                Ok(message) => from_message(message).map(Ok),
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text)),
        Message::Binary(data) => match String::from_utf8(data) {
            Ok(text) => Some(Frame::Text(text)),
            Err(_) => {
                trace!("Dropping non-UTF-8 binary frame");
                None
            }
        },
        Message::Ping(data) => Some(Frame::Ping(data)),
        Message::Pong(data) => Some(Frame::Pong(data)),
        Message::Close(_) => Some(Frame::Close),
        Message::Frame(_) => None,
    }
}
