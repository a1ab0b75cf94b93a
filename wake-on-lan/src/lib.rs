//! Wake-on-LAN for powering on TVs in standby
//!
//! A magic packet is six `0xFF` bytes followed by the target MAC address
//! repeated sixteen times, sent as a UDP broadcast to the discard port.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// Length of a magic packet in bytes
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// Port magic packets are sent to
pub const WOL_PORT: u16 = 9;

/// Errors that can occur while waking a device
#[derive(Debug, Error)]
pub enum WolError {
    /// The MAC address string is malformed
    #[error("Invalid MAC address '{0}'")]
    InvalidMac(String),

    /// Socket creation or sending failed
    #[error("Network error: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, WolError>;

/// A 48-bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = WolError;

    /// Parse `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || WolError::InvalidMac(s.to_string());

        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Build the magic packet for `mac`
pub fn magic_packet(mac: &MacAddress) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFF; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.0);
    }
    packet
}

/// Broadcast a magic packet for `mac` on the local network
pub fn wake(mac: &MacAddress) -> Result<()> {
    let target = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, WOL_PORT));
    wake_to(mac, target)
}

/// Send a magic packet for `mac` to an explicit address
pub fn wake_to(mac: &MacAddress, target: SocketAddr) -> Result<()> {
    let bind = match target {
        SocketAddr::V4(_) => "0.0.0.0:0",
        SocketAddr::V6(_) => "[::]:0",
    };
    let socket = UdpSocket::bind(bind)
        .map_err(|e| WolError::Network(format!("Failed to bind UDP socket: {}", e)))?;

    socket
        .set_broadcast(true)
        .map_err(|e| WolError::Network(format!("Failed to enable broadcast: {}", e)))?;

    let packet = magic_packet(mac);
    let sent = socket
        .send_to(&packet, target)
        .map_err(|e| WolError::Network(format!("Failed to send magic packet: {}", e)))?;
    if sent != packet.len() {
        return Err(WolError::Network(format!(
            "Short write: sent {} of {} bytes",
            sent,
            packet.len()
        )));
    }

    debug!("Sent magic packet for {} to {}", mac, target);
    Ok(())
}
