//! In-memory TV for tests
//!
//! [`MockConnector`] hands out connections whose far end is a [`MockPeer`]
//! delivered through a [`MockListener`]. The peer scripts the TV side: it
//! reads the client's requests and pushes back whatever responses, events or
//! failures a test needs.
//!
//! ```rust,ignore
//! let (connector, mut listener) = MockConnector::new();
//! // hand `connector` to a session...
//! let mut tv = listener.accept().await.unwrap();
//! let request = tv.recv_request().await.unwrap();
//! tv.respond(request.id, json!({ "volume": 55, "muted": false }));
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::message::{Request, Response};
use crate::transport::{Connector, Frame, FrameSink, FrameStream};

struct MockInner {
    peers: mpsc::UnboundedSender<MockPeer>,
    refusals: AtomicUsize,
    auto_pong: AtomicBool,
    connects: AtomicUsize,
}

/// Connector whose connections end at an in-memory [`MockPeer`]
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<MockInner>,
}

/// Receives the TV side of every connection made through a [`MockConnector`]
pub struct MockListener {
    peers: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockConnector {
    pub fn new() -> (Self, MockListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(MockInner {
                peers: tx,
                refusals: AtomicUsize::new(0),
                auto_pong: AtomicBool::new(true),
                connects: AtomicUsize::new(0),
            }),
        };
        (connector, MockListener { peers: rx })
    }

    /// Answer heartbeat pings automatically. Enabled by default and
    /// evaluated per ping, so it can be flipped on a live connection.
    pub fn set_auto_pong(&self, enabled: bool) {
        self.inner.auto_pong.store(enabled, Ordering::SeqCst);
    }

    /// Refuse the next `count` connection attempts
    pub fn refuse_next(&self, count: usize) {
        self.inner.refusals.store(count, Ordering::SeqCst);
    }

    /// Number of connection attempts so far, refused ones included
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<(FrameSink, FrameStream)> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .inner
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect {
                url: self.describe(),
                reason: "connection refused".to_string(),
            });
        }

        // client -> relay -> peer inbox
        let (client_tx, mut relay_rx) = fmpsc::unbounded::<Frame>();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel::<Frame>();
        // peer -> client
        let (outbox_tx, client_rx) = fmpsc::unbounded::<Result<Frame>>();

        let inner = Arc::clone(&self.inner);
        let pong_tx = outbox_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = relay_rx.next().await {
                if let Frame::Ping(data) = &frame {
                    if inner.auto_pong.load(Ordering::SeqCst) {
                        let _ = pong_tx.unbounded_send(Ok(Frame::Pong(data.clone())));
                    }
                }
                if inbox_tx.send(frame).is_err() {
                    break;
                }
            }
        });

        let peer = MockPeer {
            inbox: inbox_rx,
            outbox: outbox_tx,
        };
        if self.inner.peers.send(peer).is_err() {
            return Err(TransportError::Connect {
                url: self.describe(),
                reason: "listener dropped".to_string(),
            });
        }

        let sink = client_tx.sink_map_err(|_| TransportError::Closed);
        Ok((Box::pin(sink), Box::pin(client_rx)))
    }

    fn describe(&self) -> String {
        "mock://tv".to_string()
    }
}

impl MockListener {
    /// Wait for the next connection
    pub async fn accept(&mut self) -> Option<MockPeer> {
        self.peers.recv().await
    }
}

/// TV side of a mock connection. Dropping it closes the connection.
pub struct MockPeer {
    inbox: mpsc::UnboundedReceiver<Frame>,
    outbox: fmpsc::UnboundedSender<Result<Frame>>,
}

impl MockPeer {
    /// Next frame written by the client, heartbeats included.
    /// `None` once the client has hung up.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.inbox.recv().await
    }

    /// Next SSAP request written by the client, skipping heartbeats.
    /// `None` once the client has closed or hung up.
    pub async fn recv_request(&mut self) -> Option<Request> {
        loop {
            match self.recv_frame().await? {
                Frame::Text(text) => return serde_json::from_str(&text).ok(),
                Frame::Ping(_) | Frame::Pong(_) => continue,
                Frame::Close => return None,
            }
        }
    }

    pub fn send_frame(&self, frame: Frame) -> bool {
        self.outbox.unbounded_send(Ok(frame)).is_ok()
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_frame(Frame::Text(text.into()))
    }

    pub fn send_response(&self, response: &Response) -> bool {
        match response.to_text() {
            Ok(text) => self.send_text(text),
            Err(_) => false,
        }
    }

    /// Answer request `id` with an ordinary response
    pub fn respond(&self, id: u64, payload: Value) -> bool {
        self.send_response(&Response::new(id, payload))
    }

    /// Answer request `id` with an error response
    pub fn respond_error(&self, id: u64, message: &str) -> bool {
        self.send_response(&Response::error(id, message))
    }

    /// Make the client's read side fail with `error`
    pub fn fail(&self, error: TransportError) -> bool {
        self.outbox.unbounded_send(Err(error)).is_ok()
    }

    /// Send a close frame and end the client's read side
    pub fn close(&self) {
        let _ = self.outbox.unbounded_send(Ok(Frame::Close));
        self.outbox.close_channel();
    }

    /// Whether the client still holds its end of the connection
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }
}

impl Drop for MockPeer {
    fn drop(&mut self) {
        self.outbox.close_channel();
    }
}
