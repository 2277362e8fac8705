//! # Reply Decoding
//!
//! Helpers that turn raw reply bytes into typed values. None of these fail:
//! a malformed or missing reply degrades to a placeholder (`"?"`, `None`,
//! [`DeviceInfo::Raw`]) rather than an error.

use serde::Serialize;

/// Literal acknowledgement for settings commands.
pub const ACK: &[u8] = b"OK";

/// First byte of a binary stop-print acknowledgement.
pub const STOP_ACK: u8 = 0xAA;

/// Decode a text reply: lossy UTF-8, surrounding whitespace stripped.
/// An empty reply becomes `"?"`.
pub fn decode_text(reply: &[u8]) -> String {
    if reply.is_empty() {
        return "?".to_string();
    }
    String::from_utf8_lossy(reply).trim().to_string()
}

/// Settings succeed iff the reply is exactly `OK`.
pub fn is_ack(reply: &[u8]) -> bool {
    reply == ACK
}

/// Stop-print succeeds on `0xAA …` or text beginning with `OK`.
pub fn is_stop_ack(reply: &[u8]) -> bool {
    reply.first() == Some(&STOP_ACK) || reply.starts_with(ACK)
}

/// Battery reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Battery {
    pub percent: u8,
    /// Byte before the percentage is non-zero while on the charger.
    pub charging: bool,
}

/// Decode `10 FF 50 F1`. Needs at least two bytes.
pub fn parse_battery(reply: &[u8]) -> Option<Battery> {
    match reply {
        [.., flag, percent] => Some(Battery {
            percent: *percent,
            charging: *flag != 0,
        }),
        _ => None,
    }
}

/// Decode `10 FF 13`: two bytes, big-endian minutes.
pub fn parse_shutdown_time(reply: &[u8]) -> Option<u16> {
    match reply {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Positional fields of the `10 FF 70` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllInfo {
    pub bt_name: String,
    pub mac_classic: String,
    pub mac_ble: String,
    pub firmware: String,
    pub serial: String,
    /// Battery percentage as sent (e.g. `"85"`)
    pub battery: String,
}

/// Result of the aggregate info query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceInfo {
    /// No reply
    Empty,
    /// At least six fields, assigned by position
    Parsed(AllInfo),
    /// Fewer than six fields: the text as received
    Raw { raw: String },
}

/// Decode `name|macClassic|macBLE|firmware|serial|battery`.
///
/// Extra trailing fields are ignored. Short records are kept verbatim,
/// without guessing at the schema.
pub fn parse_all_info(reply: &[u8]) -> DeviceInfo {
    if reply.is_empty() {
        return DeviceInfo::Empty;
    }
    let text = String::from_utf8_lossy(reply);
    let parts: Vec<&str> = text.split('|').collect();
    if parts.len() < 6 {
        return DeviceInfo::Raw {
            raw: text.into_owned(),
        };
    }
    DeviceInfo::Parsed(AllInfo {
        bt_name: parts[0].to_string(),
        mac_classic: parts[1].to_string(),
        mac_ble: parts[2].to_string(),
        firmware: parts[3].to_string(),
        serial: parts[4].to_string(),
        battery: parts[5].trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_text_trims() {
        assert_eq!(decode_text(b"D11s\r\n"), "D11s");
        assert_eq!(decode_text(b"  2.4.6 "), "2.4.6");
        assert_eq!(decode_text(b""), "?");
    }

    #[test]
    fn test_decode_text_lossy() {
        assert_eq!(decode_text(&[b'A', 0xFF, b'B']), "A\u{FFFD}B");
    }

    #[test]
    fn test_ack_is_exact() {
        assert!(is_ack(b"OK"));
        assert!(!is_ack(b"ER"));
        assert!(!is_ack(b""));
        assert!(!is_ack(b"OK\r\n"));
    }

    #[test]
    fn test_stop_ack() {
        assert!(is_stop_ack(&[0xAA, 0x00]));
        assert!(is_stop_ack(b"OK"));
        assert!(is_stop_ack(b"OK\r\n"));
        assert!(!is_stop_ack(b"NO"));
        assert!(!is_stop_ack(b""));
    }

    #[test]
    fn test_battery() {
        assert_eq!(
            parse_battery(&[0x00, 85]),
            Some(Battery { percent: 85, charging: false })
        );
        assert_eq!(
            parse_battery(&[0x10, 0xFF, 0x01, 42]),
            Some(Battery { percent: 42, charging: true })
        );
        assert_eq!(parse_battery(&[85]), None);
        assert_eq!(parse_battery(&[]), None);
    }

    #[test]
    fn test_shutdown_time() {
        assert_eq!(parse_shutdown_time(&[0x00, 0x1E]), Some(30));
        assert_eq!(parse_shutdown_time(&[0x01, 0xE0]), Some(480));
        assert_eq!(parse_shutdown_time(&[0x01]), None);
    }

    #[test]
    fn test_all_info_parsed() {
        let info = parse_all_info(b"D11s_1234|AA:BB:CC:DD:EE:FF|AA:BB:CC:DD:EE:00|2.4.6|S123|85");
        assert_eq!(
            info,
            DeviceInfo::Parsed(AllInfo {
                bt_name: "D11s_1234".into(),
                mac_classic: "AA:BB:CC:DD:EE:FF".into(),
                mac_ble: "AA:BB:CC:DD:EE:00".into(),
                firmware: "2.4.6".into(),
                serial: "S123".into(),
                battery: "85".into(),
            })
        );
    }

    #[test]
    fn test_all_info_extra_fields_ignored() {
        let info = parse_all_info(b"a|b|c|d|e|f|g|h");
        match info {
            DeviceInfo::Parsed(all) => {
                assert_eq!(all.bt_name, "a");
                assert_eq!(all.battery, "f");
            }
            other => panic!("expected parsed record, got {:?}", other),
        }
    }

    #[test]
    fn test_all_info_short_record_is_raw() {
        assert_eq!(
            parse_all_info(b"a|b|c"),
            DeviceInfo::Raw { raw: "a|b|c".into() }
        );
        assert_eq!(parse_all_info(b""), DeviceInfo::Empty);
    }
}
