//! # D11s Command Catalog
//!
//! Byte encodings for every command the printer understands. Encoding is
//! pure: each function returns a fresh [`Command`] holding the bytes to
//! write and whether (and how long) to wait for a reply.
//!
//! ## Command Families
//!
//! Most commands share the vendor prefix `10 FF`, followed by an opcode and
//! optional parameters:
//!
//! | Family | Prefix | Example |
//! |--------|--------|---------|
//! | Info query | `10 FF 20` | `10 FF 20 F0` (model) |
//! | Setting | `10 FF 10/12/84` | `10 FF 84 02` (paper = continuous) |
//! | Print control | `10 FF FE` | `10 FF FE 45` (stop print) |
//! | ESC/POS | `1B`, `1D` | `1D 0C` (form feed) |
//!
//! ## Replies
//!
//! Info queries reply with UTF-8 text or a few binary bytes. Settings reply
//! with the literal text `OK`. Print-control commands (wakeup, enable, feed)
//! are fire-and-forget; only stop-print is acknowledged.

use std::time::Duration;

/// DLE - vendor command prefix byte
pub const DLE: u8 = 0x10;

/// Second byte of the vendor prefix
pub const VENDOR: u8 = 0xFF;

/// ESC (Escape)
pub const ESC: u8 = 0x1B;

/// GS (Group Separator)
pub const GS: u8 = 0x1D;

/// Default reply timeout for correlated commands
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Stop-print waits for the label to physically finish
pub const STOP_PRINT_TIMEOUT: Duration = Duration::from_secs(60);

/// Length of the wakeup preamble (all zero bytes)
pub const WAKEUP_LEN: usize = 12;

/// Whether the caller should wait for a reply after writing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPolicy {
    /// Fire-and-forget
    None,
    /// Wait up to the given duration for the first reply fragment
    Await(Duration),
}

/// An encoded command plus its reply policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    bytes: Vec<u8>,
    reply: ReplyPolicy,
}

impl Command {
    /// A command that expects a reply within [`DEFAULT_TIMEOUT`].
    pub fn query(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            reply: ReplyPolicy::Await(DEFAULT_TIMEOUT),
        }
    }

    /// A command with no reply.
    pub fn oneway(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            reply: ReplyPolicy::None,
        }
    }

    /// Override the reply timeout (only meaningful for queries).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.reply = ReplyPolicy::Await(timeout);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn reply(&self) -> ReplyPolicy {
        self.reply
    }
}

#[inline]
fn vendor(params: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + params.len());
    bytes.push(DLE);
    bytes.push(VENDOR);
    bytes.extend_from_slice(params);
    bytes
}

// ============================================================================
// INFO QUERIES
// ============================================================================

/// Model name (`10 FF 20 F0`), replies with text.
pub fn get_model() -> Command {
    Command::query(vendor(&[0x20, 0xF0]))
}

/// Firmware version (`10 FF 20 F1`), replies with text.
pub fn get_firmware() -> Command {
    Command::query(vendor(&[0x20, 0xF1]))
}

/// Serial number (`10 FF 20 F2`), replies with text.
pub fn get_serial() -> Command {
    Command::query(vendor(&[0x20, 0xF2]))
}

/// Bootloader version (`10 FF 20 EF`), replies with text.
pub fn get_boot_version() -> Command {
    Command::query(vendor(&[0x20, 0xEF]))
}

/// Battery level (`10 FF 50 F1`). Last reply byte is the percentage.
pub fn get_battery() -> Command {
    Command::query(vendor(&[0x50, 0xF1]))
}

/// Status bitfield (`10 FF 40`). Last reply byte is the status.
///
/// See [`crate::protocol::status::PrinterStatus`] for the bit layout.
pub fn get_status() -> Command {
    Command::query(vendor(&[0x40]))
}

/// Current density (`10 FF 11`), raw reply.
pub fn get_density() -> Command {
    Command::query(vendor(&[0x11]))
}

/// Auto-shutdown time (`10 FF 13`), 2 bytes big-endian minutes.
pub fn get_shutdown_time() -> Command {
    Command::query(vendor(&[0x13]))
}

/// Everything at once (`10 FF 70`), pipe-delimited text.
pub fn get_all_info() -> Command {
    Command::query(vendor(&[0x70]))
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Set print density (`10 FF 10 00 n`): 0 = light, 1 = medium, 2 = thick.
pub fn set_density(level: u8) -> Command {
    Command::query(vendor(&[0x10, 0x00, level]))
}

/// Set paper type (`10 FF 84 n`): 0 = gap, 1 = black mark, 2 = continuous.
pub fn set_paper_type(paper: u8) -> Command {
    Command::query(vendor(&[0x84, paper]))
}

/// Set auto-shutdown time in minutes (`10 FF 12 hi lo`).
pub fn set_shutdown_time(minutes: u16) -> Command {
    let [hi, lo] = minutes.to_be_bytes();
    Command::query(vendor(&[0x12, hi, lo]))
}

/// Restore factory settings (`10 FF 04`).
pub fn factory_reset() -> Command {
    Command::query(vendor(&[0x04]))
}

// ============================================================================
// PRINT CONTROL
// ============================================================================

/// Wake the print engine: 12 zero bytes, no reply.
pub fn wakeup() -> Command {
    Command::oneway(vec![0x00; WAKEUP_LEN])
}

/// AiYin enable (`10 FF FE 01`), no reply.
///
/// Note this is not the `10 FF F1 03` used by other LuckPrinter models.
pub fn enable() -> Command {
    Command::oneway(vendor(&[0xFE, 0x01]))
}

/// Feed paper forward by `dots` (`ESC J n`).
pub fn feed_dots(dots: u8) -> Command {
    Command::oneway(vec![ESC, b'J', dots])
}

/// Advance to the next label (`GS FF`).
pub fn form_feed() -> Command {
    Command::oneway(vec![GS, 0x0C])
}

/// AiYin stop (`10 FF FE 45`). Acknowledged with `0xAA` or `OK` once the
/// label is out, which can take a while.
pub fn stop_print() -> Command {
    Command::query(vendor(&[0xFE, 0x45])).with_timeout(STOP_PRINT_TIMEOUT)
}

/// Split a `u16` into `[low, high]` bytes.
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}
