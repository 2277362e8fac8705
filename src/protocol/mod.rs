//! # D11s Protocol Implementation
//!
//! This module provides the command encoders and reply decoders for the
//! AiYin / LuckPrinter protocol spoken by Fichero and D11s label printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Command catalog (info, settings, print control)
//! - [`status`]: Status bitfield decoding
//! - [`info`]: Text, battery and aggregate-info reply parsing
//! - [`graphics`]: Raster header, density and paper type
//!
//! ## Usage Example
//!
//! ```
//! use fichero::protocol::{commands, graphics, status::PrinterStatus};
//!
//! let cmd = commands::set_paper_type(graphics::PaperType::Gap.code());
//! assert_eq!(cmd.bytes(), &[0x10, 0xFF, 0x84, 0x00]);
//!
//! let status = PrinterStatus::from(0x00);
//! assert!(status.is_ready());
//! ```
//!
//! ## Protocol Reference
//!
//! Reverse-engineered from the vendor Android app and confirmed against a
//! D11s running firmware 2.4.6.

pub mod commands;
pub mod graphics;
pub mod info;
pub mod status;
