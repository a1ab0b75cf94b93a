//! Configuration types for the session layer
//!
//! This module defines the timing knobs of a [`Session`](crate::Session):
//! how long to wait for the TV, how quickly to retry, and how aggressively
//! to probe the link for liveness.

use std::time::Duration;

use crate::error::SessionError;

/// Configuration for a supervised session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for opening the WebSocket
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Fixed delay between failed connection or pairing attempts
    /// Default: 2 seconds
    pub retry_delay: Duration,

    /// Deadline for the pairing handshake, including on-screen approval
    /// Default: 60 seconds
    pub pairing_timeout: Duration,

    /// Time without a heartbeat acknowledgement after which the link is
    /// considered dead. Heartbeats go out every 9/10 of this.
    /// Default: 10 seconds
    pub liveness_timeout: Duration,

    /// Deadline applied to calls made without an explicit one
    /// Default: 5 seconds
    pub request_timeout: Duration,

    /// Capacity of the outbound frame queue
    /// Default: 64
    pub outbound_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(2),
            pairing_timeout: Duration::from_secs(60),
            liveness_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            outbound_buffer: 64,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short deadlines for one-shot command-line use against a TV that is
    /// already paired
    pub fn interactive() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(1),
            pairing_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Interval between heartbeats
    pub fn heartbeat_period(&self) -> Duration {
        self.liveness_timeout * 9 / 10
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.connect_timeout.is_zero() {
            return Err(SessionError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.pairing_timeout.is_zero() {
            return Err(SessionError::Configuration(
                "Pairing timeout must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_period().is_zero() {
            return Err(SessionError::Configuration(
                "Liveness timeout is too short to schedule heartbeats".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(SessionError::Configuration(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.outbound_buffer == 0 {
            return Err(SessionError::Configuration(
                "Outbound buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_pairing_timeout(mut self, timeout: Duration) -> Self {
        self.pairing_timeout = timeout;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_outbound_buffer(mut self, size: usize) -> Self {
        self.outbound_buffer = size;
        self
    }
}
