//! # Raster Graphics and Print Settings
//!
//! The D11s accepts a single raster image per label via the ESC/POS
//! `GS v 0` command. The printhead is 96 dots wide, so every row is exactly
//! 12 bytes.
//!
//! ## Bit Packing
//!
//! - Bit 7 (MSB) = leftmost dot
//! - 1 = black (burn), 0 = white
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! ```

use std::fmt;
use std::str::FromStr;

use super::commands::{GS, u16_le};

/// Print density levels accepted by `10 FF 10 00 n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Density {
    Light = 0,
    Medium = 1,
    #[default]
    Thick = 2,
}

impl Density {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Density {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::Light),
            1 => Ok(Self::Medium),
            2 => Ok(Self::Thick),
            n => Err(format!("density must be 0, 1, or 2 (got {})", n)),
        }
    }
}

/// Media types accepted by `10 FF 84 n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaperType {
    /// Die-cut labels separated by gaps
    #[default]
    Gap = 0,
    /// Continuous stock with printed black marks
    BlackMark = 1,
    /// Continuous roll
    Continuous = 2,
}

impl PaperType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl FromStr for PaperType {
    type Err = String;

    /// Accepts `gap`, `black`, `continuous` or `0`-`2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gap" | "0" => Ok(Self::Gap),
            "black" | "black-mark" | "1" => Ok(Self::BlackMark),
            "continuous" | "2" => Ok(Self::Continuous),
            _ => Err(format!(
                "Unknown paper type '{}'. Use gap, black, continuous, or 0-2",
                s
            )),
        }
    }
}

impl fmt::Display for PaperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gap => "gap",
            Self::BlackMark => "black",
            Self::Continuous => "continuous",
        })
    }
}

/// Length of the `GS v 0` header.
pub const RASTER_HEADER_LEN: usize = 8;

/// # Raster Bit Image (GS v 0 m xL xH yL yH d1...dk)
///
/// | Format | Bytes |
/// |--------|-------|
/// | Hex    | 1D 76 30 m xL xH yL yH d1...dk |
///
/// - `m`: mode, always 0 (normal density)
/// - `xL xH`: width in bytes (12 on the D11s, so `xH` is 0)
/// - `yL yH`: number of rows, little-endian
///
/// ## Example
///
/// ```
/// use fichero::protocol::graphics;
///
/// let header = graphics::raster_header(12, 240);
/// assert_eq!(header, [0x1D, 0x76, 0x30, 0x00, 12, 0x00, 240, 0x00]);
/// ```
pub fn raster_header(row_bytes: u8, rows: u16) -> [u8; RASTER_HEADER_LEN] {
    let [yl, yh] = u16_le(rows);
    [GS, b'v', b'0', 0x00, row_bytes, 0x00, yl, yh]
}

/// Header followed by the packed rows, ready for the chunked sender.
pub fn raster(row_bytes: u8, rows: u16, data: &[u8]) -> Vec<u8> {
    debug_assert!(
        data.len() == row_bytes as usize * rows as usize,
        "Raster data length mismatch. Expected {} ({} bytes × {} rows), got {}",
        row_bytes as usize * rows as usize,
        row_bytes,
        rows,
        data.len()
    );

    let mut cmd = Vec::with_capacity(RASTER_HEADER_LEN + data.len());
    cmd.extend_from_slice(&raster_header(row_bytes, rows));
    cmd.extend_from_slice(data);
    cmd
}
