//! # Printer Transport Layer
//!
//! This module provides the communication backends for talking to a printer.
//! Every backend implements [`Transport`], so the correlator and print job
//! never care which physical link is in use.
//!
//! ## Available Transports
//!
//! - [`ble`]: Bluetooth LE GATT (notify + write-without-response)
//! - [`rfcomm`]: Classic Bluetooth RFCOMM socket (Linux)
//! - [`scripted`]: In-process fake printer for tests
//!
//! ## Link Kinds
//!
//! | Kind | Delivery | Chunk size | Chunk delay |
//! |------|----------|------------|-------------|
//! | BLE | notification fragments | 200 B | 20 ms |
//! | RFCOMM | byte stream | 16 KiB | none |

pub mod ble;
pub mod rfcomm;
pub mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FicheroError, Result};

pub use ble::BleTransport;
pub use rfcomm::RfcommTransport;
pub use scripted::{ScriptHandle, ScriptedTransport};

/// Time allowed for a link to come up before giving up.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something the link delivered to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// An inbound data fragment
    Data(Vec<u8>),
    /// The peer or the local side closed the link
    Closed,
    /// The reader hit an I/O error and stopped
    Error(String),
}

/// Callback invoked for every inbound [`Notification`]. Must not block.
pub type NotifyCallback = Arc<dyn Fn(Notification) + Send + Sync>;

/// Physical link kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Fragment-oriented GATT link
    Ble,
    /// Stream-oriented RFCOMM socket
    Rfcomm,
}

impl TransportKind {
    /// Stream links have their own flow control; fragment links do not.
    pub fn is_stream_oriented(self) -> bool {
        matches!(self, Self::Rfcomm)
    }
}

/// A connected link to one printer.
///
/// Implementations are owned by exactly one correlator. `close` must be
/// idempotent and must end any in-flight receive by delivering
/// [`Notification::Closed`] to the subscriber.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame (BLE) or a run of bytes (RFCOMM).
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Register the single inbound callback and start delivering.
    async fn subscribe(&self, callback: NotifyCallback) -> Result<()>;

    /// Stop delivery and release the link.
    async fn close(&self) -> Result<()>;

    fn kind(&self) -> TransportKind;
}

/// How to reach a printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// BLE; scan by name prefix when no address is given
    Ble { address: Option<String> },
    /// RFCOMM to an explicit address and channel
    Rfcomm { address: String, channel: u8 },
}

impl Link {
    /// Classic links cannot scan, so an address is mandatory.
    pub fn classic(address: Option<String>, channel: u8) -> Result<Self> {
        match address {
            Some(address) => Ok(Self::Rfcomm { address, channel }),
            None => Err(FicheroError::ConnectFailure(
                "an address is required for Classic Bluetooth (no scanning)".to_string(),
            )),
        }
    }
}

/// Open the requested link kind.
pub async fn open(link: &Link) -> Result<Box<dyn Transport>> {
    match link {
        Link::Ble { address } => {
            let transport = BleTransport::connect(address.as_deref()).await?;
            Ok(Box::new(transport))
        }
        Link::Rfcomm { address, channel } => {
            let transport = RfcommTransport::connect(address, *channel).await?;
            Ok(Box::new(transport))
        }
    }
}

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}
