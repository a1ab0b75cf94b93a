//! Supervised session
//!
//! A [`Session`] runs the connection lifecycle in a background task for as
//! long as it lives:
//!
//! 1. connect, retrying after a fixed delay for as long as it takes
//! 2. pair with the last known key
//! 3. re-issue every live subscription, start heartbeats, serve callers
//! 4. on any failure, release waiting callers and start over
//!
//! Callers never see transport errors. While no connection is active, calls
//! fail fast with [`SessionError::NotConnected`] and new subscriptions wait
//! dormant for the next connection.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use ssap_client::Connector;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::error::{Result, SessionError};
use crate::pairing;
use crate::registry::{Callback, Subscription, SubscriptionEntry, SubscriptionEvent, SubscriptionRegistry};
use crate::state::SessionState;

struct Shared {
    config: SessionConfig,
    active: RwLock<Option<Arc<Connection>>>,
    registry: SubscriptionRegistry,
    state: watch::Sender<SessionState>,
    key: RwLock<String>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Session state {} -> {}", previous, state);
        }
    }

    fn active(&self) -> Option<Arc<Connection>> {
        self.active.read().clone()
    }

    /// Issue every live subscription not yet bound to `connection`
    async fn replay(&self, connection: &Connection) {
        for entry in self.registry.snapshot() {
            match connection.bind_subscription(&entry).await {
                Ok(true) => debug!(
                    "Issued subscription {} to {} in epoch {}",
                    entry.key(),
                    entry.uri(),
                    connection.epoch()
                ),
                Ok(false) => {}
                Err(e) => warn!(
                    "Could not issue subscription {} to {}: {}",
                    entry.key(),
                    entry.uri(),
                    e
                ),
            }
        }
    }
}

/// A self-healing connection to one TV
///
/// # Example
///
/// ```rust,ignore
/// use ssap_client::WebSocketConnector;
/// use webos_session::{Session, SessionConfig};
///
/// let session = Session::spawn(WebSocketConnector::new("192.168.1.20"), SessionConfig::default(), key)?;
/// session.wait_until_active(Duration::from_secs(30)).await?;
///
/// let volume = session.call("ssap://audio/getVolume", None).await?;
/// ```
pub struct Session {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Start supervising a connection made through `connector`
    ///
    /// `key` is the pairing key from a previous run, empty if unpaired. Must
    /// be called from within a Tokio runtime.
    pub fn spawn<C: Connector>(connector: C, config: SessionConfig, key: impl Into<String>) -> Result<Self> {
        config.validate()?;

        let (state, _) = watch::channel(SessionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            config,
            active: RwLock::new(None),
            registry: SubscriptionRegistry::new(),
            state,
            key: RwLock::new(key.into()),
            shutdown,
        });

        let supervisor = tokio::spawn(supervise(Arc::clone(&shared), Arc::new(connector)));

        Ok(Self {
            shared,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Observe state transitions
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Whether calls are currently being served
    pub fn is_connected(&self) -> bool {
        self.shared.active.read().is_some()
    }

    /// Number of live (not cancelled) subscriptions
    pub fn subscription_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// The key the TV last accepted or issued
    pub fn pairing_key(&self) -> String {
        self.shared.key.read().clone()
    }

    /// Wait until the session is active
    ///
    /// Fails with [`SessionError::Timeout`] if that takes longer than
    /// `timeout`, and with [`SessionError::NotConnected`] if the session has
    /// been stopped.
    pub async fn wait_until_active(&self, timeout: Duration) -> Result<()> {
        let mut states = self.watch_state();
        let wait = async {
            loop {
                let state = *states.borrow_and_update();
                match state {
                    SessionState::Active => return Ok(()),
                    SessionState::Stopped => return Err(SessionError::NotConnected),
                    _ => {}
                }
                if states.changed().await.is_err() {
                    return Err(SessionError::NotConnected);
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::Timeout(timeout))?
    }

    /// Call `uri` with the configured request timeout
    pub async fn call(&self, uri: &str, payload: Option<Value>) -> Result<Value> {
        self.call_with_deadline(uri, payload, self.shared.config.request_timeout)
            .await
    }

    /// Call `uri` and wait at most `deadline` for the reply
    pub async fn call_with_deadline(
        &self,
        uri: &str,
        payload: Option<Value>,
        deadline: Duration,
    ) -> Result<Value> {
        let connection = self.shared.active().ok_or(SessionError::NotConnected)?;
        connection.call(uri, payload, deadline).await
    }

    /// Subscribe to `uri`
    ///
    /// The callback runs once per event, in arrival order, on a task of its
    /// own. The subscription is issued immediately when connected, otherwise
    /// on the next connection, and again after every reconnect until
    /// cancelled.
    pub async fn subscribe<F>(&self, uri: &str, payload: Option<Value>, callback: F) -> Subscription
    where
        F: Fn(SubscriptionEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let (subscription, entry) = self.shared.registry.insert(uri, payload, callback);

        if let Some(connection) = self.shared.active() {
            self.bind(&connection, &entry).await;
        }
        subscription
    }

    /// Binding only fails once `connection` is being torn down, so the
    /// supervisor's replay on the next connection picks the entry up.
    async fn bind(&self, connection: &Connection, entry: &SubscriptionEntry) {
        if let Err(e) = connection.bind_subscription(entry).await {
            debug!(
                "Subscription {} stays dormant until the next connection: {}",
                entry.key(),
                e
            );
        }
    }

    /// Stop supervising and close the connection
    pub async fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);

        let supervisor = self.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            if let Err(e) = supervisor.await {
                warn!("Session supervisor ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.shutdown.send_replace(true);
    }
}

/// Sleep for the retry delay. Returns `true` if shutdown was requested.
async fn pause(shared: &Shared, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(shared.config.retry_delay) => false,
        _ = shutdown.changed() => true,
    }
}

async fn supervise(shared: Arc<Shared>, connector: Arc<dyn Connector>) {
    let mut shutdown = shared.shutdown.subscribe();
    let endpoint = connector.describe();
    let config = shared.config.clone();
    let mut epoch = 0u64;

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        shared.set_state(SessionState::Connecting);
        let attempt = tokio::time::timeout(config.connect_timeout, connector.connect());
        let result = tokio::select! {
            result = attempt => result,
            _ = shutdown.changed() => break,
        };

        let (sink, stream) = match result {
            Ok(Ok(halves)) => halves,
            Ok(Err(e)) => {
                warn!("Could not connect to {}: {}", endpoint, e);
                shared.set_state(SessionState::Disconnected);
                if pause(&shared, &mut shutdown).await {
                    break;
                }
                continue;
            }
            Err(_) => {
                warn!(
                    "Timed out connecting to {} after {:?}",
                    endpoint, config.connect_timeout
                );
                shared.set_state(SessionState::Disconnected);
                if pause(&shared, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        epoch += 1;
        let connection = Connection::open(epoch, sink, stream, &config);

        let key = shared.key.read().clone();
        let registration = tokio::select! {
            result = pairing::register(&connection, &key, config.pairing_timeout) => result,
            _ = shutdown.changed() => {
                connection.close().await;
                break;
            }
        };

        match registration {
            Ok(new_key) => {
                if new_key != key {
                    info!("TV issued a new pairing key");
                    *shared.key.write() = new_key;
                }
            }
            Err(e) => {
                warn!("Pairing with {} failed: {}", endpoint, e.source);
                connection.shutdown();
                shared.set_state(SessionState::Disconnected);
                if pause(&shared, &mut shutdown).await {
                    break;
                }
                continue;
            }
        }
        shared.set_state(SessionState::Paired);

        shared.replay(&connection).await;
        connection.start_keepalive(config.liveness_timeout);
        *shared.active.write() = Some(Arc::clone(&connection));
        // Catch subscriptions registered while the first pass was running.
        shared.replay(&connection).await;
        shared.set_state(SessionState::Active);
        info!("Connected to {} (epoch {})", endpoint, epoch);

        let lost = tokio::select! {
            reason = connection.closed() => Some(reason),
            _ = shutdown.changed() => None,
        };

        shared.active.write().take();
        match &lost {
            Some(reason) => {
                warn!("Lost connection to {}: {}", endpoint, reason);
                connection.shutdown();
            }
            None => connection.close().await,
        }
        shared.registry.mark_dormant();
        shared.set_state(SessionState::Disconnected);

        if lost.is_none() {
            break;
        }
    }

    shared.active.write().take();
    shared.registry.mark_dormant();
    shared.set_state(SessionState::Stopped);
    info!("Session with {} stopped", endpoint);
}
