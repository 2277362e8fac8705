//! # Printer Configuration
//!
//! Hardware constants and command timings for supported label printers.
//!
//! ## Supported Printers
//!
//! | Model | Width (dots) | Resolution | Links |
//! |-------|--------------|------------|-------|
//! | Fichero / D11s | 96 | 203 DPI | BLE, RFCOMM |
//!
//! ## Usage
//!
//! ```
//! use fichero::printer::PrinterConfig;
//!
//! let config = PrinterConfig::D11S;
//! println!("Print width: {} dots ({} bytes)",
//!          config.width_dots,
//!          config.width_bytes);
//! ```

use std::time::Duration;

use uuid::Uuid;

/// # Printer Configuration
///
/// Defines the hardware characteristics of a label printer.
///
/// ## Physical Properties
///
/// - **width_dots**: Printhead width in dots (pixels)
/// - **width_bytes**: Width in bytes (width_dots / 8), the `GS v 0` row size
/// - **dots_per_mm**: Feed resolution, used to turn label lengths into rows
///
/// ## Bluetooth Identity
///
/// - **name_prefixes**: Advertised names that identify the printer
/// - **service / write_char / notify_char**: GATT layout of the BLE link
/// - **rfcomm_channel**: Serial port channel of the classic link
///
/// ## Calculations
///
/// ```text
/// 203 DPI / 25.4 ≈ 8 dots per mm
///
/// For D11s:
///   width_mm = 96 / 8 = 12mm
///   30mm label = 30 × 8 = 240 rows
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PrinterConfig {
    /// Printhead width in dots (pixels)
    pub width_dots: u16,

    /// Print width in bytes (width_dots / 8)
    pub width_bytes: u8,

    /// Rows per millimetre of label (203 DPI)
    pub dots_per_mm: u16,

    /// BLE local-name prefixes used for discovery
    pub name_prefixes: &'static [&'static str],

    /// Primary GATT service
    pub service: Uuid,

    /// Write-without-response characteristic
    pub write_char: Uuid,

    /// Notify characteristic carrying replies
    pub notify_char: Uuid,

    /// RFCOMM channel of the serial port profile
    pub rfcomm_channel: u8,
}

impl PrinterConfig {
    /// # Fichero / D11s Configuration
    ///
    /// 12mm label printer sold under the Fichero and D11s names, running
    /// AiYin LuckPrinter firmware.
    ///
    /// ## Specifications
    ///
    /// | Property | Value |
    /// |----------|-------|
    /// | Label width | 12-15mm |
    /// | Print width | 12mm (96 dots) |
    /// | Resolution | 203 DPI |
    /// | Interface | BLE / Bluetooth Classic |
    pub const D11S: Self = Self {
        width_dots: 96,
        width_bytes: 12,
        dots_per_mm: 8,
        name_prefixes: &["FICHERO", "D11s_"],
        service: Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb),
        write_char: Uuid::from_u128(0x00002af1_0000_1000_8000_00805f9b34fb),
        notify_char: Uuid::from_u128(0x00002af0_0000_1000_8000_00805f9b34fb),
        rfcomm_channel: 1,
    };

    /// Label rows for a length in millimetres, `None` on overflow.
    ///
    /// ```
    /// use fichero::printer::PrinterConfig;
    ///
    /// assert_eq!(PrinterConfig::D11S.mm_to_rows(30), Some(240));
    /// ```
    #[inline]
    pub fn mm_to_rows(&self, mm: u16) -> Option<u16> {
        mm.checked_mul(self.dots_per_mm)
    }

    /// Whether an advertised name belongs to this printer.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name_prefixes.iter().any(|prefix| name.starts_with(prefix))
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::D11S
    }
}

// ============================================================================
// TIMING
// ============================================================================

/// Delays the firmware needs between print-sequence steps.
///
/// Shortening these makes the printer silently drop the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// After set-density, before the first copy
    pub after_density: Duration,
    /// After paper type, wakeup and enable
    pub command_gap: Duration,
    /// Between raster chunks on fragment-oriented links
    pub chunk_gap: Duration,
    /// After the last raster chunk
    pub raster_settle: Duration,
    /// After form feed
    pub after_feed: Duration,
    /// Extra wait after a reply so trailing fragments land in the buffer
    pub notify_settle: Duration,
}

impl Timing {
    pub const D11S: Self = Self {
        after_density: Duration::from_millis(100),
        command_gap: Duration::from_millis(50),
        chunk_gap: Duration::from_millis(20),
        raster_settle: Duration::from_millis(500),
        after_feed: Duration::from_millis(300),
        notify_settle: Duration::from_millis(50),
    };

    /// No delays at all, for tests against a scripted transport.
    pub const ZERO: Self = Self {
        after_density: Duration::ZERO,
        command_gap: Duration::ZERO,
        chunk_gap: Duration::ZERO,
        raster_settle: Duration::ZERO,
        after_feed: Duration::ZERO,
        notify_settle: Duration::ZERO,
    };
}

impl Default for Timing {
    fn default() -> Self {
        Self::D11S
    }
}

// ============================================================================
// TESTS
// ============================================================================
