//! # Printer Client
//!
//! [`Printer`] is one live connection: a [`Correlator`] plus typed wrappers
//! around every command in [`crate::protocol::commands`].
//!
//! ## Reply Handling
//!
//! | Operation | Reply | Result |
//! |-----------|-------|--------|
//! | `get_model` etc. | text | trimmed string, `"?"` if empty |
//! | `get_status` | bitfield | [`PrinterStatus`], `UNKNOWN` if empty |
//! | `set_*` | `OK` | `true` only on exact `OK` |
//! | `stop_print` | `AA…` / `OK…` | `true` on ack; a timeout is `false` |
//!
//! Queries and settings propagate timeouts; only stop-print softens them,
//! since the label has usually printed by the time it is late.

use log::{info, warn};
use serde::Serialize;

use crate::error::{FicheroError, Result};
use crate::printer::config::Timing;
use crate::printer::correlator::Correlator;
use crate::protocol::commands::{self, Command};
use crate::protocol::graphics::{Density, PaperType};
use crate::protocol::info::{self, Battery, DeviceInfo};
use crate::protocol::status::PrinterStatus;
use crate::transport::{self, Link, Transport};

/// Longest auto-shutdown the firmware accepts, in minutes.
pub const MAX_SHUTDOWN_MINUTES: u16 = 480;

/// Everything `info` reports, gathered one query at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterInfo {
    pub model: String,
    pub firmware: String,
    pub boot: String,
    pub serial: String,
    pub battery: Option<Battery>,
    pub status: PrinterStatus,
    pub shutdown_minutes: Option<u16>,
}

/// A connected printer.
pub struct Printer {
    correlator: Correlator,
    timing: Timing,
}

impl Printer {
    /// Open `link` and start listening for replies.
    pub async fn connect(link: &Link) -> Result<Self> {
        let transport = transport::open(link).await?;
        Self::with_transport(transport, Timing::D11S).await
    }

    /// Wrap an already-open transport.
    pub async fn with_transport(transport: Box<dyn Transport>, timing: Timing) -> Result<Self> {
        let correlator = Correlator::new(transport, timing);
        if let Err(e) = correlator.start().await {
            // Dropping a transport does not disconnect it.
            if let Err(close_err) = correlator.close().await {
                warn!("Close after failed subscribe: {}", close_err);
            }
            return Err(e);
        }
        Ok(Self { correlator, timing })
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub async fn close(&self) -> Result<()> {
        self.correlator.close().await
    }

    async fn text(&self, command: Command) -> Result<String> {
        let reply = self.correlator.send(&command).await?;
        Ok(info::decode_text(&reply))
    }

    /// Settings answer `OK`; any other reply is `false`. Silence is a
    /// [`FicheroError::Timeout`].
    async fn setting(&self, command: Command) -> Result<bool> {
        let reply = self.correlator.send(&command).await?;
        Ok(info::is_ack(&reply))
    }

    // ========================================================================
    // INFO
    // ========================================================================

    pub async fn get_model(&self) -> Result<String> {
        self.text(commands::get_model()).await
    }

    pub async fn get_firmware(&self) -> Result<String> {
        self.text(commands::get_firmware()).await
    }

    pub async fn get_serial(&self) -> Result<String> {
        self.text(commands::get_serial()).await
    }

    pub async fn get_boot_version(&self) -> Result<String> {
        self.text(commands::get_boot_version()).await
    }

    /// `None` when the reply is shorter than two bytes.
    pub async fn get_battery(&self) -> Result<Option<Battery>> {
        let reply = self.correlator.send(&commands::get_battery()).await?;
        Ok(info::parse_battery(&reply))
    }

    pub async fn get_status(&self) -> Result<PrinterStatus> {
        let reply = self.correlator.send(&commands::get_status()).await?;
        Ok(PrinterStatus::from_reply(&reply))
    }

    /// Raw density reply; its layout is undocumented.
    pub async fn get_density(&self) -> Result<Vec<u8>> {
        self.correlator.send(&commands::get_density()).await
    }

    pub async fn get_shutdown_time(&self) -> Result<Option<u16>> {
        let reply = self.correlator.send(&commands::get_shutdown_time()).await?;
        Ok(info::parse_shutdown_time(&reply))
    }

    pub async fn get_all_info(&self) -> Result<DeviceInfo> {
        let reply = self.correlator.send(&commands::get_all_info()).await?;
        Ok(info::parse_all_info(&reply))
    }

    /// Status first, then the identity and power queries.
    pub async fn get_info(&self) -> Result<PrinterInfo> {
        let status = self.get_status().await?;
        Ok(PrinterInfo {
            model: self.get_model().await?,
            firmware: self.get_firmware().await?,
            boot: self.get_boot_version().await?,
            serial: self.get_serial().await?,
            battery: self.get_battery().await?,
            status,
            shutdown_minutes: self.get_shutdown_time().await?,
        })
    }

    // ========================================================================
    // SETTINGS
    // ========================================================================

    pub async fn set_density(&self, density: Density) -> Result<bool> {
        self.setting(commands::set_density(density.level())).await
    }

    pub async fn set_paper_type(&self, paper: PaperType) -> Result<bool> {
        self.setting(commands::set_paper_type(paper.code())).await
    }

    /// Accepts 1 to 480 minutes; anything else is rejected without sending.
    pub async fn set_shutdown_time(&self, minutes: u16) -> Result<bool> {
        if !(1..=MAX_SHUTDOWN_MINUTES).contains(&minutes) {
            return Err(FicheroError::InvalidCommand(format!(
                "shutdown must be 1-{} minutes (got {})",
                MAX_SHUTDOWN_MINUTES, minutes
            )));
        }
        self.setting(commands::set_shutdown_time(minutes)).await
    }

    pub async fn factory_reset(&self) -> Result<bool> {
        info!("Restoring factory settings");
        self.setting(commands::factory_reset()).await
    }

    // ========================================================================
    // PRINT CONTROL
    // ========================================================================

    pub async fn wakeup(&self) -> Result<()> {
        self.correlator.send(&commands::wakeup()).await.map(drop)
    }

    pub async fn enable(&self) -> Result<()> {
        self.correlator.send(&commands::enable()).await.map(drop)
    }

    pub async fn feed_dots(&self, dots: u8) -> Result<()> {
        self.correlator.send(&commands::feed_dots(dots)).await.map(drop)
    }

    pub async fn form_feed(&self) -> Result<()> {
        self.correlator.send(&commands::form_feed()).await.map(drop)
    }

    /// Wait for the label to finish. `false` if the printer never
    /// acknowledged within the stop-print window.
    pub async fn stop_print(&self) -> Result<bool> {
        match self.correlator.send(&commands::stop_print()).await {
            Ok(reply) => Ok(info::is_stop_ack(&reply)),
            Err(FicheroError::Timeout(after)) => {
                warn!("No stop-print acknowledgement within {:?}", after);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
