//! Heartbeat supervision
//!
//! Sends a WebSocket ping every 9/10 of the liveness timeout and expects the
//! TV's pong before the timeout runs out, measured from the last pong. The
//! margin lets one heartbeat go unanswered before the TV's own read timeout
//! could fire.

use std::sync::Arc;
use std::time::Duration;

use ssap_client::Frame;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::connection::Disconnect;

/// Probe the link until it stops answering
///
/// `ack` is notified by the reader for every pong. Returns the failure that
/// ended supervision; it returns exactly once.
pub(crate) async fn run(
    epoch: u64,
    outbound: mpsc::Sender<Frame>,
    ack: Arc<Notify>,
    liveness: Duration,
) -> Disconnect {
    let period = liveness * 9 / 10;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let deadline = time::sleep(liveness);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = ticker.tick() => match outbound.try_send(Frame::Ping(Vec::new())) {
                Ok(()) => trace!("Sent heartbeat on connection {}", epoch),
                Err(TrySendError::Full(_)) => {
                    debug!("Outbound queue full on connection {}, skipping heartbeat", epoch);
                }
                Err(TrySendError::Closed(_)) => return Disconnect::HeartbeatFailed,
            },
            _ = ack.notified() => {
                deadline.as_mut().reset(Instant::now() + liveness);
            }
            _ = &mut deadline => return Disconnect::HeartbeatTimeout(liveness),
        }
    }
}
