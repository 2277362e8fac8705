//! # Print Orchestration
//!
//! The firmware accepts a label only when it sees this exact sequence, with
//! pauses in between:
//!
//! ```text
//! set density ─ 100ms ─┐
//!                      ▼
//!   ┌──► status ─► paper type ─ 50ms ─► wakeup ─ 50ms ─► enable ─ 50ms ─┐
//!   │                                                                   │
//!   │    stop print ◄─ 300ms ─ form feed ◄─ 500ms ─ raster (chunked) ◄──┘
//!   │        │
//!   └────────┘  next copy
//! ```
//!
//! A status that is not ready aborts the whole job before anything is
//! burned. A missing stop-print acknowledgement is only logged: the label
//! has usually printed by then.

use std::time::Duration;

use log::{info, warn};

use crate::error::{FicheroError, PrintStep, Result};
use crate::printer::client::Printer;
use crate::printer::config::PrinterConfig;
use crate::protocol::graphics::{self, Density, PaperType};
use crate::render::Raster;

/// One print request: a raster plus settings, printed `copies` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub density: Density,
    pub paper: PaperType,
    pub copies: u16,
    pub raster: Raster,
}

impl PrintJob {
    /// Rejects zero copies and rasters the printhead cannot take: the width
    /// must be exactly [`PrinterConfig::width_dots`].
    pub fn new(raster: Raster, density: Density, paper: PaperType, copies: u16) -> Result<Self> {
        if copies == 0 {
            return Err(FicheroError::InvalidCommand(
                "copies must be at least 1".to_string(),
            ));
        }
        if raster.rows == 0 || raster.data.len() != raster.row_bytes() * raster.rows as usize {
            return Err(FicheroError::Image(format!(
                "raster data is {} bytes, expected {} ({} × {} rows)",
                raster.data.len(),
                raster.row_bytes() * raster.rows as usize,
                raster.row_bytes(),
                raster.rows
            )));
        }
        let config = PrinterConfig::D11S;
        if raster.width != config.width_dots {
            return Err(FicheroError::Image(format!(
                "raster is {} dots wide, the printhead takes {}",
                raster.width, config.width_dots
            )));
        }
        Ok(Self {
            density,
            paper,
            copies,
            raster,
        })
    }

    /// `GS v 0` header followed by the packed rows.
    pub fn payload(&self) -> Vec<u8> {
        graphics::raster(
            PrinterConfig::D11S.width_bytes,
            self.raster.rows,
            &self.raster.data,
        )
    }
}

/// Reported before each step of each copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintProgress {
    /// 1-based copy number
    pub copy: u16,
    pub total: u16,
    pub stage: PrintStep,
}

/// Outcome of a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReport {
    pub copies: u16,
    /// Whether each copy's stop-print was acknowledged
    pub acknowledged: Vec<bool>,
}

impl PrintReport {
    pub fn all_acknowledged(&self) -> bool {
        self.acknowledged.iter().all(|&ack| ack)
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl Printer {
    /// Run `job` once, start to finish.
    pub async fn print(&self, job: &PrintJob) -> Result<PrintReport> {
        self.print_with_progress(job, |_| {}).await
    }

    /// Run `job`, calling `progress` as each step starts.
    ///
    /// Errors carry the failing step and copy, except
    /// [`FicheroError::NotReady`] which is returned as is.
    pub async fn print_with_progress<F>(&self, job: &PrintJob, mut progress: F) -> Result<PrintReport>
    where
        F: FnMut(PrintProgress) + Send,
    {
        let timing = self.timing();
        let total = job.copies;
        let payload = job.payload();
        info!(
            "Printing {}x{}, {} bytes, {} {}",
            job.raster.width,
            job.raster.rows,
            job.raster.data.len(),
            total,
            if total == 1 { "copy" } else { "copies" }
        );

        progress(PrintProgress {
            copy: 1,
            total,
            stage: PrintStep::Density,
        });
        let applied = self
            .set_density(job.density)
            .await
            .map_err(|e| e.at(PrintStep::Density, 1))?;
        if !applied {
            warn!("Density {:?} not acknowledged", job.density);
        }
        pause(timing.after_density).await;

        let mut acknowledged = Vec::with_capacity(total as usize);
        for copy in 1..=total {
            if total > 1 {
                info!("Copy {}/{}", copy, total);
            }
            let mut step = |stage| progress(PrintProgress { copy, total, stage });

            step(PrintStep::Status);
            let status = self
                .get_status()
                .await
                .map_err(|e| e.at(PrintStep::Status, copy))?;
            if !status.is_ready() {
                return Err(FicheroError::NotReady { status });
            }

            step(PrintStep::PaperType);
            let applied = self
                .set_paper_type(job.paper)
                .await
                .map_err(|e| e.at(PrintStep::PaperType, copy))?;
            if !applied {
                warn!("Paper type {} not acknowledged", job.paper);
            }
            pause(timing.command_gap).await;

            step(PrintStep::Wakeup);
            self.wakeup()
                .await
                .map_err(|e| e.at(PrintStep::Wakeup, copy))?;
            pause(timing.command_gap).await;

            step(PrintStep::Enable);
            self.enable()
                .await
                .map_err(|e| e.at(PrintStep::Enable, copy))?;
            pause(timing.command_gap).await;

            step(PrintStep::Raster);
            self.correlator()
                .send_chunked(&payload, None)
                .await
                .map_err(|e| e.at(PrintStep::Raster, copy))?;
            pause(timing.raster_settle).await;

            step(PrintStep::FormFeed);
            self.form_feed()
                .await
                .map_err(|e| e.at(PrintStep::FormFeed, copy))?;
            pause(timing.after_feed).await;

            step(PrintStep::StopPrint);
            let ack = self
                .stop_print()
                .await
                .map_err(|e| e.at(PrintStep::StopPrint, copy))?;
            if !ack {
                warn!("No OK/0xAA from stop command (copy {})", copy);
            }
            acknowledged.push(ack);
        }

        Ok(PrintReport {
            copies: total,
            acknowledged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(rows: u16) -> Raster {
        Raster {
            width: 96,
            rows,
            data: vec![0; 12 * rows as usize],
        }
    }

    #[test]
    fn test_zero_copies_rejected() {
        let err = PrintJob::new(raster(2), Density::Thick, PaperType::Gap, 0).unwrap_err();
        assert!(matches!(err, FicheroError::InvalidCommand(_)));
    }

    #[test]
    fn test_mismatched_raster_rejected() {
        let mut bad = raster(2);
        bad.data.pop();
        assert!(PrintJob::new(bad, Density::Thick, PaperType::Gap, 1).is_err());
        assert!(PrintJob::new(raster(0), Density::Thick, PaperType::Gap, 1).is_err());
    }

    #[test]
    fn test_narrow_raster_rejected() {
        let narrow = Raster {
            width: 16,
            rows: 3,
            data: vec![0xFF; 6],
        };
        let err = PrintJob::new(narrow, Density::Thick, PaperType::Gap, 1).unwrap_err();
        assert!(matches!(err, FicheroError::Image(_)));
    }

    #[test]
    fn test_payload_has_header() {
        let job = PrintJob::new(raster(240), Density::Medium, PaperType::Gap, 1).unwrap();
        let payload = job.payload();
        assert_eq!(&payload[..8], &[0x1D, 0x76, 0x30, 0x00, 12, 0x00, 240, 0x00]);
        assert_eq!(payload.len(), 8 + 12 * 240);
    }

    #[test]
    fn test_report_acknowledgements() {
        let report = PrintReport {
            copies: 2,
            acknowledged: vec![true, false],
        };
        assert!(!report.all_acknowledged());
    }
}
