//! # Printer Status Bitfield
//!
//! The reply to `10 FF 40` ends with a single status byte:
//!
//! ```text
//! bit  7   6   5   4   3   2   1   0
//!      -  OH  CHG OH  LB  NP  CO  PR
//!
//! PR  printing        LB  low battery
//! CO  cover open      OH  overheated (either bit)
//! NP  no paper        CHG charging
//! ```
//!
//! The firmware reports overheating on two different bits depending on the
//! revision, so both are checked.

use std::fmt;

use serde::Serialize;

const PRINTING: u8 = 0x01;
const COVER_OPEN: u8 = 0x02;
const NO_PAPER: u8 = 0x04;
const LOW_BATTERY: u8 = 0x08;
const OVERHEATED_A: u8 = 0x10;
const CHARGING: u8 = 0x20;
const OVERHEATED_B: u8 = 0x40;

/// Decoded status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrinterStatus {
    pub raw: u8,
    pub printing: bool,
    pub cover_open: bool,
    pub no_paper: bool,
    pub low_battery: bool,
    pub overheated: bool,
    pub charging: bool,
}

impl PrinterStatus {
    /// Status assumed when the printer does not answer: every flag set,
    /// so [`PrinterStatus::is_ready`] is false.
    pub const UNKNOWN: Self = Self::decode(0xFF);

    pub const fn decode(byte: u8) -> Self {
        Self {
            raw: byte,
            printing: byte & PRINTING != 0,
            cover_open: byte & COVER_OPEN != 0,
            no_paper: byte & NO_PAPER != 0,
            low_battery: byte & LOW_BATTERY != 0,
            overheated: byte & OVERHEATED_A != 0 || byte & OVERHEATED_B != 0,
            charging: byte & CHARGING != 0,
        }
    }

    /// Build from a full reply: the status is the last byte.
    pub fn from_reply(reply: &[u8]) -> Self {
        reply.last().map_or(Self::UNKNOWN, |&b| Self::decode(b))
    }

    /// Whether the printer can accept a label.
    pub fn is_ready(&self) -> bool {
        !(self.cover_open || self.no_paper || self.overheated)
    }
}

impl From<u8> for PrinterStatus {
    fn from(byte: u8) -> Self {
        Self::decode(byte)
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.printing, "printing"),
            (self.cover_open, "cover open"),
            (self.no_paper, "no paper"),
            (self.low_battery, "low battery"),
            (self.overheated, "overheated"),
            (self.charging, "charging"),
        ];
        let active: Vec<&str> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if active.is_empty() {
            f.write_str("ready")
        } else {
            f.write_str(&active.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_low_bits() {
        let s = PrinterStatus::from(0x07);
        assert!(s.printing);
        assert!(s.cover_open);
        assert!(s.no_paper);
        assert!(!s.low_battery);
        assert!(!s.overheated);
        assert!(!s.charging);
        assert!(!s.is_ready());
    }

    #[test]
    fn test_zero_is_ready() {
        let s = PrinterStatus::from(0x00);
        assert!(s.is_ready());
        assert_eq!(s.to_string(), "ready");
    }

    #[test]
    fn test_overheated_either_bit() {
        assert!(PrinterStatus::from(0x10).overheated);
        assert!(PrinterStatus::from(0x40).overheated);
        assert!(!PrinterStatus::from(0x10).is_ready());
        assert!(!PrinterStatus::from(0x40).is_ready());
    }

    #[test]
    fn test_soft_flags_do_not_block() {
        // printing, low battery and charging are informational
        let s = PrinterStatus::from(PRINTING | LOW_BATTERY | CHARGING);
        assert!(s.is_ready());
        assert_eq!(s.to_string(), "printing, low battery, charging");
    }

    #[test]
    fn test_unknown_is_not_ready() {
        assert_eq!(PrinterStatus::UNKNOWN.raw, 0xFF);
        assert!(!PrinterStatus::UNKNOWN.is_ready());
        assert_eq!(PrinterStatus::from_reply(&[]), PrinterStatus::UNKNOWN);
    }

    #[test]
    fn test_from_reply_uses_last_byte() {
        let s = PrinterStatus::from_reply(&[0x10, 0xFF, 0x40, 0x00]);
        assert!(s.is_ready());
        let s = PrinterStatus::from_reply(&[0x00, 0x04]);
        assert!(s.no_paper);
    }
}
