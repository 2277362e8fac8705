//! # Fichero - Thermal Label Printer Library
//!
//! Fichero is a Rust library for printing on Fichero / D11s thermal label
//! printers (AiYin LuckPrinter firmware) over Bluetooth. It provides:
//!
//! - **Transport**: Bluetooth LE (GATT) and Classic (RFCOMM) links
//! - **Correlation**: request/reply over a notification stream, with timeouts
//! - **Protocol**: command encoders and reply decoders
//! - **Rendering**: resize, autocontrast, Floyd–Steinberg and bit packing
//! - **Printing**: the timed sequence the firmware needs to accept a label
//!
//! ## Quick Start
//!
//! ```no_run
//! use fichero::{
//!     printer::{PrintJob, Printer},
//!     protocol::graphics::{Density, PaperType},
//!     render::{self, text},
//!     transport::Link,
//! };
//!
//! # async fn demo() -> fichero::error::Result<()> {
//! // Scan for the printer over BLE and connect
//! let printer = Printer::connect(&Link::Ble { address: None }).await?;
//!
//! // Render a 30mm label (240 dots) and pack it for the printhead
//! let label = text::text_to_image("Hello", 30, 240)?;
//! let raster = render::prepare(&image::DynamicImage::ImageLuma8(label), 240, false)?;
//!
//! // Run the print sequence
//! let job = PrintJob::new(raster, Density::Thick, PaperType::Gap, 1)?;
//! let report = printer.print(&job).await?;
//! assert_eq!(report.copies, 1);
//!
//! printer.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`transport`] | BLE, RFCOMM and scripted links |
//! | [`printer`] | Correlator, command set, print sequence, configuration |
//! | [`protocol`] | Command bytes and reply decoding |
//! | [`render`] | Image and text to raster |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Currently tested with:
//! - Fichero / D11s (12mm, 96 dots, 203 DPI), firmware 2.4.6

pub mod error;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod transport;

// Re-exports for convenience
pub use error::FicheroError;
pub use printer::{Printer, PrinterConfig};
pub use transport::Link;
