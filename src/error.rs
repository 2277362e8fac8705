//! # Error Types
//!
//! This module defines error types used throughout the fichero library.
//!
//! Every variant is local to one connection or one print job. Nothing here
//! is fatal to the process: a failed job leaves the caller free to close the
//! connection and try again.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::status::PrinterStatus;

/// Main error type for fichero operations
#[derive(Debug, Error)]
pub enum FicheroError {
    /// No matching printer was discovered
    #[error("Printer not found: {0}")]
    NotFound(String),

    /// No reply arrived within the command's deadline
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// Printer status forbids printing (cover open, no paper, overheated)
    #[error("Printer not ready: {status}")]
    NotReady { status: PrinterStatus },

    /// The requested link kind is not supported on this host
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Link establishment failed (partial resources already released)
    #[error("Connection failed: {0}")]
    ConnectFailure(String),

    /// The link was closed while a command was waiting for its reply
    #[error("Transport closed")]
    TransportClosed,

    /// Transport-level errors after the link is up (write failure, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid command or parameter
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(String),

    /// A print job step failed
    #[error("Print failed at {step} (copy {copy}): {source}")]
    Job {
        step: PrintStep,
        copy: u16,
        #[source]
        source: Box<FicheroError>,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FicheroError>;

/// Steps of the print sequence, used to report where a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStep {
    Density,
    Status,
    PaperType,
    Wakeup,
    Enable,
    Raster,
    FormFeed,
    StopPrint,
}

impl fmt::Display for PrintStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Density => "set density",
            Self::Status => "status check",
            Self::PaperType => "set paper type",
            Self::Wakeup => "wakeup",
            Self::Enable => "enable",
            Self::Raster => "raster transfer",
            Self::FormFeed => "form feed",
            Self::StopPrint => "stop print",
        };
        f.write_str(name)
    }
}

impl FicheroError {
    /// Attach the failing print step to an error.
    pub(crate) fn at(self, step: PrintStep, copy: u16) -> Self {
        match self {
            // NotReady already names the cause and carries the status.
            e @ Self::NotReady { .. } => e,
            e => Self::Job {
                step,
                copy,
                source: Box::new(e),
            },
        }
    }

    /// The underlying error, looking through [`FicheroError::Job`].
    pub fn root(&self) -> &FicheroError {
        match self {
            Self::Job { source, .. } => source.root(),
            e => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_names_step() {
        let err = FicheroError::Timeout(Duration::from_secs(2)).at(PrintStep::PaperType, 1);
        assert_eq!(
            err.to_string(),
            "Print failed at set paper type (copy 1): No response within 2s"
        );
        assert!(matches!(err.root(), FicheroError::Timeout(_)));
    }

    #[test]
    fn test_not_ready_is_not_wrapped() {
        let status = PrinterStatus::from(0x02);
        let err = FicheroError::NotReady { status }.at(PrintStep::Status, 2);
        assert!(matches!(err, FicheroError::NotReady { .. }));
        assert_eq!(err.to_string(), "Printer not ready: cover open");
    }
}
