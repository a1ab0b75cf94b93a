//! Long-lived subscriptions
//!
//! A subscription outlives the connection it was issued on. The registry
//! keeps every live subscription for the whole session; each connection epoch
//! binds them to fresh wire ids. Events reach the callback through a
//! dedicated dispatcher task, so one slow callback never holds up the reader
//! or other subscriptions, and invocations for a single subscription never
//! overlap.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::correlator::{Correlator, Delivery};
use crate::error::TvError;

/// One event pushed by the TV for a subscription
///
/// An error reply is delivered as `Err` but does not end the subscription.
pub type SubscriptionEvent = Result<Value, TvError>;

pub(crate) type Callback = Arc<dyn Fn(SubscriptionEvent) + Send + Sync>;

/// Where a subscription currently lives on the wire
pub(crate) struct Binding {
    pub epoch: u64,
    pub wire_id: u64,
    pub correlator: Weak<Correlator>,
}

pub(crate) struct SubscriptionState {
    cancelled: AtomicBool,
    pub binding: Mutex<Option<Binding>>,
}

impl SubscriptionState {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn bound_epoch(&self) -> Option<u64> {
        self.binding.lock().as_ref().map(|b| b.epoch)
    }

    /// Drop the current binding and its route, if any
    fn unbind(&self) {
        let binding = self.binding.lock().take();
        if let Some(binding) = binding {
            if let Some(correlator) = binding.correlator.upgrade() {
                correlator.remove(binding.wire_id);
            }
        }
    }
}

/// Registry record of a subscription
pub(crate) struct SubscriptionEntry {
    key: u64,
    uri: String,
    payload: Option<Value>,
    pub state: Arc<SubscriptionState>,
    pub deliveries: mpsc::UnboundedSender<Delivery>,
}

impl SubscriptionEntry {
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn payload(&self) -> Option<Value> {
        self.payload.clone()
    }
}

#[derive(Default)]
struct RegistryInner {
    next_key: u64,
    entries: HashMap<u64, Arc<SubscriptionEntry>>,
}

/// Every live subscription of a session
#[derive(Clone, Default)]
pub(crate) struct SubscriptionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dormant subscription and start its dispatcher
    pub fn insert(
        &self,
        uri: &str,
        payload: Option<Value>,
        callback: Callback,
    ) -> (Subscription, Arc<SubscriptionEntry>) {
        let state = Arc::new(SubscriptionState {
            cancelled: AtomicBool::new(false),
            binding: Mutex::new(None),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let entry = {
            let mut inner = self.inner.lock();
            let key = inner.next_key;
            inner.next_key += 1;

            let entry = Arc::new(SubscriptionEntry {
                key,
                uri: uri.to_string(),
                payload,
                state: Arc::clone(&state),
                deliveries: tx,
            });
            inner.entries.insert(key, Arc::clone(&entry));
            entry
        };

        tokio::spawn(dispatch_loop(entry.key, rx, Arc::clone(&state), callback));
        debug!("Registered subscription {} to {}", entry.key, entry.uri);

        let handle = Subscription {
            key: entry.key,
            uri: entry.uri.clone(),
            state,
            registry: Arc::downgrade(&self.inner),
        };
        (handle, entry)
    }

    /// Snapshot of the live subscriptions, in registration order
    pub fn snapshot(&self) -> Vec<Arc<SubscriptionEntry>> {
        let mut entries: Vec<_> = self.inner.lock().entries.values().cloned().collect();
        entries.sort_by_key(|e| e.key);
        entries
    }

    /// Detach every subscription from its connection. Entries stay
    /// registered and are bound again by the next epoch.
    pub fn mark_dormant(&self) {
        for entry in self.snapshot() {
            entry.state.binding.lock().take();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

async fn dispatch_loop(
    key: u64,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    state: Arc<SubscriptionState>,
    callback: Callback,
) {
    while let Some(delivery) = deliveries.recv().await {
        if state.is_cancelled() {
            break;
        }
        // A message queued before a reconnect belongs to a dead epoch.
        if state.bound_epoch() != Some(delivery.epoch) {
            trace!(
                "Dropping stale event for subscription {} from epoch {}",
                key,
                delivery.epoch
            );
            continue;
        }

        let event = match delivery.response.error_message() {
            Some(message) => Err(TvError::new(message)),
            None => Ok(delivery.response.payload),
        };
        // A panicking callback loses that event, not the subscription.
        if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            warn!("Callback for subscription {} panicked", key);
        }
    }
    trace!("Dispatcher for subscription {} finished", key);
}

/// Handle to a registered subscription
///
/// Dropping the handle leaves the subscription running; call
/// [`cancel`](Subscription::cancel) to stop it.
pub struct Subscription {
    key: u64,
    uri: String,
    state: Arc<SubscriptionState>,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Subscription {
    /// Session-unique identifier, stable across reconnects
    pub fn id(&self) -> u64 {
        self.key
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Stop forwarding events to the callback
    ///
    /// The protocol has no unsubscribe message, so the TV may keep sending;
    /// such messages are discarded. A cancelled subscription is not re-issued
    /// on reconnect. Cancelling twice is a no-op.
    pub fn cancel(&self) {
        if self.state.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.lock().entries.remove(&self.key);
        }
        self.state.unbind();
        debug!("Cancelled subscription {} to {}", self.key, self.uri);
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_cancelled()
    }

    /// Whether the subscription is currently issued on a live connection
    pub fn is_bound(&self) -> bool {
        self.state.bound_epoch().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.key)
            .field("uri", &self.uri)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssap_client::Response;
    use serde_json::json;
    use std::time::Duration;

    fn recording_callback() -> (Callback, mpsc::UnboundedReceiver<SubscriptionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: Callback = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        (callback, rx)
    }

    fn bind(entry: &SubscriptionEntry, correlator: &Arc<Correlator>) -> u64 {
        let wire_id = correlator.register_stream(entry.deliveries.clone()).unwrap();
        *entry.state.binding.lock() = Some(Binding {
            epoch: correlator.epoch(),
            wire_id,
            correlator: Arc::downgrade(correlator),
        });
        wire_id
    }

    #[tokio::test]
    async fn test_events_reach_callback_in_order() {
        let registry = SubscriptionRegistry::new();
        let (callback, mut events) = recording_callback();
        let (_subscription, entry) = registry.insert("ssap://audio/getVolume", None, callback);

        let correlator = Arc::new(Correlator::new(1));
        let wire_id = bind(&entry, &correlator);

        correlator.dispatch(Response::new(wire_id, json!({ "volume": 1 })));
        correlator.dispatch(Response::error(wire_id, "500 internal"));
        correlator.dispatch(Response::new(wire_id, json!({ "volume": 2 })));

        assert_eq!(events.recv().await.unwrap(), Ok(json!({ "volume": 1 })));
        assert_eq!(events.recv().await.unwrap(), Err(TvError::new("500 internal")));
        assert_eq!(events.recv().await.unwrap(), Ok(json!({ "volume": 2 })));
    }

    #[tokio::test]
    async fn test_panicking_callback_keeps_dispatcher_running() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut events) = mpsc::unbounded_channel();
        let callback: Callback = Arc::new(move |event: SubscriptionEvent| {
            if event == Ok(json!("boom")) {
                panic!("callback failed");
            }
            let _ = tx.send(event);
        });
        let (_subscription, entry) = registry.insert("ssap://audio/getVolume", None, callback);

        let correlator = Arc::new(Correlator::new(1));
        let wire_id = bind(&entry, &correlator);

        correlator.dispatch(Response::new(wire_id, json!("boom")));
        correlator.dispatch(Response::new(wire_id, json!("after")));

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Ok(json!("after")));
    }

    #[tokio::test]
    async fn test_cancel_removes_entry_and_route() {
        let registry = SubscriptionRegistry::new();
        let (callback, mut events) = recording_callback();
        let (subscription, entry) = registry.insert("ssap://audio/getVolume", None, callback);

        let correlator = Arc::new(Correlator::new(1));
        let wire_id = bind(&entry, &correlator);
        assert!(subscription.is_bound());

        subscription.cancel();
        subscription.cancel();

        assert!(!subscription.is_active());
        assert_eq!(registry.len(), 0);
        assert_eq!(correlator.pending(), 0);
        assert!(!correlator.dispatch(Response::new(wire_id, json!({}))));

        drop(entry);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dormant_subscription_drops_stale_events() {
        let registry = SubscriptionRegistry::new();
        let (callback, mut events) = recording_callback();
        let (subscription, entry) = registry.insert("ssap://audio/getVolume", None, callback);

        let old = Arc::new(Correlator::new(1));
        let old_id = bind(&entry, &old);
        registry.mark_dormant();
        assert!(!subscription.is_bound());

        // Still routed by the dead epoch's table, but no longer bound to it.
        old.dispatch(Response::new(old_id, json!("stale")));

        let new = Arc::new(Correlator::new(2));
        let new_id = bind(&entry, &new);
        new.dispatch(Response::new(new_id, json!("fresh")));

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Ok(json!("fresh")));
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        for uri in ["a", "b", "c"] {
            let (callback, _events) = recording_callback();
            registry.insert(uri, None, callback);
        }

        let uris: Vec<_> = registry.snapshot().iter().map(|e| e.uri().to_string()).collect();
        assert_eq!(uris, vec!["a", "b", "c"]);
    }
}
