//! # Printer Module
//!
//! A live connection to a printer and everything that runs over it.
//!
//! ## Modules
//!
//! - [`config`]: Hardware constants and command timings
//! - [`correlator`]: One-at-a-time command/reply exchange and chunked bulk writes
//! - [`client`]: Typed command set on a connection
//! - [`job`]: The print sequence

pub mod client;
pub mod config;
pub mod correlator;
pub mod job;

pub use client::{Printer, PrinterInfo};
pub use config::{PrinterConfig, Timing};
pub use correlator::Correlator;
pub use job::{PrintJob, PrintProgress, PrintReport};
