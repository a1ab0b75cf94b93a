//! Request/response correlation for one connection epoch
//!
//! Every outbound message gets the next id from a monotonic per-epoch
//! counter. Inbound messages are routed purely by id, either to a one-shot
//! [`PendingCall`] or to a subscription's delivery queue. Ids are never
//! reused within an epoch, so a late reply to an abandoned call can only be
//! discarded, never misrouted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use ssap_client::Response;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Result, SessionError};

/// A subscription event tagged with the epoch it arrived in
#[derive(Debug)]
pub(crate) struct Delivery {
    pub epoch: u64,
    pub response: Response,
}

#[derive(Clone)]
enum Route {
    Call(mpsc::UnboundedSender<Response>),
    Stream(mpsc::UnboundedSender<Delivery>),
}

#[derive(Default)]
struct Table {
    next_id: u64,
    routes: HashMap<u64, Route>,
    closed: bool,
}

impl Table {
    fn allocate(&mut self, route: Route) -> Result<u64> {
        if self.closed {
            return Err(SessionError::NotConnected);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.routes.insert(id, route);
        Ok(id)
    }
}

/// Id allocator and routing table of one connection epoch
pub struct Correlator {
    epoch: u64,
    table: Mutex<Table>,
}

impl Correlator {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            table: Mutex::new(Table::default()),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Allocate an id for a one-shot exchange
    ///
    /// The slot stays registered until the returned guard is dropped, so an
    /// exchange may read several messages on the same id.
    pub fn register_call(self: &Arc<Self>) -> Result<PendingCall> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.table.lock().allocate(Route::Call(tx))?;
        trace!("Registered call {} in epoch {}", id, self.epoch);

        Ok(PendingCall {
            id,
            rx,
            correlator: Arc::clone(self),
        })
    }

    /// Allocate an id whose messages are forwarded to `deliveries` until removed
    pub(crate) fn register_stream(&self, deliveries: mpsc::UnboundedSender<Delivery>) -> Result<u64> {
        let id = self.table.lock().allocate(Route::Stream(deliveries))?;
        trace!("Registered stream {} in epoch {}", id, self.epoch);
        Ok(id)
    }

    /// Forget `id`. Returns whether it was registered.
    pub fn remove(&self, id: u64) -> bool {
        self.table.lock().routes.remove(&id).is_some()
    }

    /// Route an inbound message to whoever registered its id
    ///
    /// Returns `false` if the message was discarded.
    pub fn dispatch(&self, response: Response) -> bool {
        let Some(id) = response.id else {
            debug!("Discarding message without id in epoch {}", self.epoch);
            return false;
        };

        let route = self.table.lock().routes.get(&id).cloned();

        match route {
            Some(Route::Call(tx)) => tx.send(response).is_ok(),
            Some(Route::Stream(tx)) => tx
                .send(Delivery {
                    epoch: self.epoch,
                    response,
                })
                .is_ok(),
            None => {
                debug!("Discarding message for unknown id {} in epoch {}", id, self.epoch);
                false
            }
        }
    }

    /// Close the table and drop every route
    ///
    /// Waiting calls observe [`SessionError::NotConnected`]; later
    /// registrations fail the same way. Returns the number of routes dropped.
    pub fn release_all(&self) -> usize {
        let routes = {
            let mut table = self.table.lock();
            table.closed = true;
            std::mem::take(&mut table.routes)
        };
        routes.len()
    }

    /// Number of registered ids
    pub fn pending(&self) -> usize {
        self.table.lock().routes.len()
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }
}

/// A registered one-shot exchange
///
/// Dropping the guard removes the slot, so abandoning the wait (timeout or
/// cancellation of the caller's future) never leaks an entry.
pub struct PendingCall {
    id: u64,
    rx: mpsc::UnboundedReceiver<Response>,
    correlator: Arc<Correlator>,
}

impl PendingCall {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next message on this id
    pub async fn recv(&mut self) -> Result<Response> {
        self.rx.recv().await.ok_or(SessionError::NotConnected)
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.correlator.remove(self.id);
    }
}
