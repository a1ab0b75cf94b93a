//! One connection epoch
//!
//! A [`Connection`] owns the tasks serving a single transport instance: a
//! reader that routes inbound messages, a writer that is the only place
//! frames are written, and, once the session is active, a heartbeat
//! supervisor. Any of them can declare the connection dead; the first reason
//! wins and is reported by [`Connection::closed`].

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use ssap_client::{Frame, FrameSink, FrameStream, Request, RequestKind, Response};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::correlator::{Correlator, PendingCall};
use crate::error::{Result, SessionError, TvError};
use crate::keepalive;
use crate::registry::{Binding, SubscriptionEntry};

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Disconnect {
    #[error("connection closed by TV")]
    ClosedByPeer,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no heartbeat acknowledgement within {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("heartbeat could not be sent")]
    HeartbeatFailed,

    #[error("connection closed locally")]
    Closed,
}

/// First-reason-wins failure latch shared by the connection's tasks
#[derive(Clone)]
struct DisconnectSignal(Arc<watch::Sender<Option<Disconnect>>>);

impl DisconnectSignal {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self(Arc::new(tx))
    }

    fn raise(&self, reason: Disconnect) -> bool {
        self.0.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(reason);
                true
            } else {
                false
            }
        })
    }

    fn subscribe(&self) -> watch::Receiver<Option<Disconnect>> {
        self.0.subscribe()
    }

    fn get(&self) -> Option<Disconnect> {
        self.0.borrow().clone()
    }
}

#[derive(Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
}

/// A live transport instance and the tasks serving it
pub struct Connection {
    epoch: u64,
    correlator: Arc<Correlator>,
    outbound: mpsc::Sender<Frame>,
    disconnect: DisconnectSignal,
    ack: Arc<Notify>,
    tasks: Mutex<Tasks>,
}

impl Connection {
    /// Start serving an opened transport as epoch `epoch`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(epoch: u64, sink: FrameSink, stream: FrameStream, config: &SessionConfig) -> Arc<Self> {
        let correlator = Arc::new(Correlator::new(epoch));
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer);
        let disconnect = DisconnectSignal::new();
        let ack = Arc::new(Notify::new());

        let writer = tokio::spawn(write_loop(
            epoch,
            sink,
            outbound_rx,
            disconnect.clone(),
            disconnect.subscribe(),
        ));
        let reader = tokio::spawn(read_loop(
            epoch,
            stream,
            Arc::clone(&correlator),
            Arc::clone(&ack),
            disconnect.clone(),
        ));

        debug!("Opened connection epoch {}", epoch);

        Arc::new(Self {
            epoch,
            correlator,
            outbound: outbound_tx,
            disconnect,
            ack,
            tasks: Mutex::new(Tasks {
                reader: Some(reader),
                writer: Some(writer),
                keepalive: None,
            }),
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub fn is_open(&self) -> bool {
        self.disconnect.get().is_none()
    }

    /// Send a request and register for its replies
    pub async fn request(
        &self,
        kind: RequestKind,
        uri: Option<&str>,
        payload: Option<Value>,
    ) -> Result<PendingCall> {
        let pending = self.correlator.register_call()?;

        let mut request = Request::new(pending.id(), kind).with_payload(payload);
        request.uri = uri.map(str::to_string);

        self.send(&request).await?;
        Ok(pending)
    }

    /// Issue a one-shot request and wait for its reply
    ///
    /// `deadline` covers queueing the request as well as the wait. A TV error
    /// reply becomes [`SessionError::Tv`]; losing the connection becomes
    /// [`SessionError::NotConnected`].
    pub async fn call(&self, uri: &str, payload: Option<Value>, deadline: Duration) -> Result<Value> {
        tokio::time::timeout(deadline, self.exchange(uri, payload))
            .await
            .map_err(|_| SessionError::Timeout(deadline))?
    }

    async fn exchange(&self, uri: &str, payload: Option<Value>) -> Result<Value> {
        let mut pending = self.request(RequestKind::Request, Some(uri), payload).await?;
        let response = pending.recv().await?;
        into_payload(response)
    }

    /// Issue `entry` on this connection unless it is cancelled or already
    /// bound here. Returns whether a subscribe request was sent.
    pub(crate) async fn bind_subscription(&self, entry: &SubscriptionEntry) -> Result<bool> {
        let wire_id = {
            let mut binding = entry.state.binding.lock();
            if entry.state.is_cancelled() {
                return Ok(false);
            }
            if matches!(&*binding, Some(b) if b.epoch == self.epoch) {
                return Ok(false);
            }

            let wire_id = self.correlator.register_stream(entry.deliveries.clone())?;
            *binding = Some(Binding {
                epoch: self.epoch,
                wire_id,
                correlator: Arc::downgrade(&self.correlator),
            });
            wire_id
        };

        let request = Request::new(wire_id, RequestKind::Subscribe)
            .with_uri(entry.uri())
            .with_payload(entry.payload());

        if let Err(e) = self.send(&request).await {
            {
                let mut binding = entry.state.binding.lock();
                if matches!(&*binding, Some(b) if b.epoch == self.epoch && b.wire_id == wire_id) {
                    *binding = None;
                }
            }
            self.correlator.remove(wire_id);
            return Err(e);
        }

        trace!(
            "Subscription {} bound to id {} in epoch {}",
            entry.key(),
            wire_id,
            self.epoch
        );
        Ok(true)
    }

    /// Start heartbeat supervision. Idempotent.
    pub fn start_keepalive(&self, liveness: Duration) {
        let mut tasks = self.tasks.lock();
        if tasks.keepalive.is_some() {
            return;
        }

        let epoch = self.epoch;
        let outbound = self.outbound.clone();
        let ack = Arc::clone(&self.ack);
        let disconnect = self.disconnect.clone();
        tasks.keepalive = Some(tokio::spawn(async move {
            let reason = keepalive::run(epoch, outbound, ack, liveness).await;
            warn!("Heartbeat failed on connection {}: {}", epoch, reason);
            disconnect.raise(reason);
        }));
    }

    /// Wait until the connection has ended and report why
    pub async fn closed(&self) -> Disconnect {
        let mut signal = self.disconnect.subscribe();
        loop {
            let current = signal.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if signal.changed().await.is_err() {
                return Disconnect::Closed;
            }
        }
    }

    /// Close the connection gracefully, sending a close frame if the writer
    /// is still running
    pub async fn close(&self) {
        let _ = self.outbound.try_send(Frame::Close);

        let writer = self.tasks.lock().writer.take();
        if let Some(writer) = writer {
            if tokio::time::timeout(Duration::from_secs(1), writer).await.is_err() {
                debug!("Writer of connection {} did not finish closing", self.epoch);
            }
        }
        self.shutdown();
    }

    /// Tear the connection down immediately
    ///
    /// Every pending call resolves with [`SessionError::NotConnected`].
    pub fn shutdown(&self) {
        self.disconnect.raise(Disconnect::Closed);
        let released = self.correlator.release_all();
        if released > 0 {
            debug!("Released {} pending ids of connection {}", released, self.epoch);
        }

        let mut tasks = self.tasks.lock();
        for handle in [tasks.reader.take(), tasks.writer.take(), tasks.keepalive.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }

    async fn send(&self, request: &Request) -> Result<()> {
        let text = request
            .to_text()
            .map_err(|e| SessionError::Encode(e.to_string()))?;
        trace!("-> {}", text);

        self.outbound
            .send(Frame::Text(text))
            .await
            .map_err(|_| SessionError::NotConnected)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn into_payload(response: Response) -> Result<Value> {
    match response.error_message() {
        Some(message) => Err(SessionError::Tv(TvError::new(message))),
        None => Ok(response.payload),
    }
}

async fn write_loop(
    epoch: u64,
    mut sink: FrameSink,
    mut outbound: mpsc::Receiver<Frame>,
    disconnect: DisconnectSignal,
    mut signal: watch::Receiver<Option<Disconnect>>,
) {
    loop {
        tokio::select! {
            biased;

            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let closing = frame == Frame::Close;

                if let Err(e) = sink.send(frame).await {
                    warn!("Write failed on connection {}: {}", epoch, e);
                    disconnect.raise(Disconnect::Transport(e.to_string()));
                    break;
                }
                if closing {
                    break;
                }
            }
            _ = signal.changed() => break,
        }
    }

    let _ = sink.close().await;
    trace!("Writer of connection {} finished", epoch);
}

async fn read_loop(
    epoch: u64,
    mut stream: FrameStream,
    correlator: Arc<Correlator>,
    ack: Arc<Notify>,
    disconnect: DisconnectSignal,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Frame::Text(text))) => match Response::from_text(&text) {
                Ok(response) => {
                    trace!("<- {}", text);
                    correlator.dispatch(response);
                }
                Err(e) => warn!("Discarding message on connection {}: {}", epoch, e),
            },
            Some(Ok(Frame::Pong(_))) => ack.notify_one(),
            Some(Ok(Frame::Ping(_))) => {}
            Some(Ok(Frame::Close)) | None => break Disconnect::ClosedByPeer,
            Some(Err(e)) => break Disconnect::Transport(e.to_string()),
        }
    };

    correlator.release_all();
    if disconnect.raise(reason.clone()) {
        debug!("Connection {} ended: {}", epoch, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ssap_client::mock::MockConnector;
    use ssap_client::{Connector, TransportError};

    async fn open_mock() -> (Arc<Connection>, ssap_client::mock::MockPeer) {
        let (connector, mut listener) = MockConnector::new();
        let (sink, stream) = connector.connect().await.unwrap();
        let connection = Connection::open(1, sink, stream, &SessionConfig::default());
        let peer = listener.accept().await.unwrap();
        (connection, peer)
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let (connection, mut tv) = open_mock().await;

        let call = tokio::spawn({
            let connection = Arc::clone(&connection);
            async move {
                connection
                    .call("ssap://audio/getVolume", None, Duration::from_secs(5))
                    .await
            }
        });

        let request = tv.recv_request().await.unwrap();
        assert_eq!(request.id, 0);
        assert_eq!(request.kind, RequestKind::Request);
        assert_eq!(request.uri.as_deref(), Some("ssap://audio/getVolume"));
        assert_eq!(request.payload, None);

        tv.respond(request.id, json!({ "volume": 9, "muted": false }));
        let payload = call.await.unwrap().unwrap();
        assert_eq!(payload["volume"], 9);
        assert_eq!(connection.correlator().pending(), 0);
    }

    #[tokio::test]
    async fn test_tv_error_keeps_connection_open() {
        let (connection, mut tv) = open_mock().await;

        let call = tokio::spawn({
            let connection = Arc::clone(&connection);
            async move {
                connection
                    .call("ssap://system/turnOff", None, Duration::from_secs(5))
                    .await
            }
        });

        let request = tv.recv_request().await.unwrap();
        tv.respond_error(request.id, "401 insufficient permissions");

        let error = call.await.unwrap().unwrap_err();
        assert_eq!(
            error,
            SessionError::Tv(TvError::new("401 insufficient permissions"))
        );
        assert!(connection.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_frees_slot() {
        let (connection, mut tv) = open_mock().await;

        let error = connection
            .call("ssap://audio/getVolume", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(error, SessionError::Timeout(Duration::from_secs(5)));
        assert_eq!(connection.correlator().pending(), 0);
        assert!(connection.is_open());

        // A late reply is discarded.
        let request = tv.recv_request().await.unwrap();
        tv.respond(request.id, json!({}));
    }

    #[tokio::test]
    async fn test_peer_close_is_reported() {
        let (connection, tv) = open_mock().await;
        tv.close();

        assert_eq!(connection.closed().await, Disconnect::ClosedByPeer);
        assert!(!connection.is_open());
        assert!(connection.correlator().is_closed());
    }

    #[tokio::test]
    async fn test_transport_error_is_reported() {
        let (connection, tv) = open_mock().await;
        tv.fail(TransportError::WebSocket("reset by peer".to_string()));

        assert!(matches!(connection.closed().await, Disconnect::Transport(_)));
        let error = connection
            .call("ssap://audio/getVolume", None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(error, SessionError::NotConnected);
    }

    #[tokio::test]
    async fn test_undecodable_message_is_ignored() {
        let (connection, mut tv) = open_mock().await;

        let call = tokio::spawn({
            let connection = Arc::clone(&connection);
            async move {
                connection
                    .call("ssap://audio/getVolume", None, Duration::from_secs(5))
                    .await
            }
        });

        let request = tv.recv_request().await.unwrap();
        tv.send_text("{ not json");
        tv.respond(request.id, json!({ "volume": 3 }));

        assert_eq!(call.await.unwrap().unwrap()["volume"], 3);
        assert!(connection.is_open());
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let (connection, mut tv) = open_mock().await;

        connection.close().await;
        assert_eq!(tv.recv_frame().await, Some(Frame::Close));
        assert_eq!(connection.closed().await, Disconnect::Closed);
    }
}
