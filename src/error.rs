//! Error taxonomy for the print agent.
//!
//! Every variant's `Display` output is the short, kebab-case code that goes
//! over the wire or into a job record, so callers can match on it.

use thiserror::Error;

/// Reasons a print request is refused at admission. No job is created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("invalid-json")]
    InvalidJson,
    #[error("payload-too-large")]
    PayloadTooLarge,
    #[error("invalid-payload")]
    InvalidPayload,
    #[error("missing-content")]
    MissingContent,
    #[error("queue-full")]
    QueueFull,
    #[error("shutting-down")]
    ShuttingDown,
}

/// Failures while rendering and printing an admitted job.
///
/// These never reach the submitting caller; they are recorded on the job.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("printer-not-found")]
    PrinterNotFound,
    #[error("renderer-not-found")]
    RendererNotFound,
    #[error("print-timeout")]
    PrintTimeout,
    #[error("renderer-exit-{0}")]
    RendererExit(i32),
    /// The renderer exited without a code (killed by a signal).
    #[error("renderer-terminated")]
    RendererTerminated,
    #[error("renderer-spawn-failed")]
    RendererSpawn(#[source] std::io::Error),
    #[error("printer-list-failed")]
    PrinterList(String),
    #[error("set-default-printer-failed")]
    SetDefaultPrinter(String),
    #[error("io-error")]
    Io(#[from] std::io::Error),
    /// The job's runner task panicked or was aborted.
    #[error("internal-error")]
    Internal(String),
}

impl PrintError {
    /// Extra context for logs; the `Display` form stays a bare code.
    pub fn detail(&self) -> Option<String> {
        match self {
            PrintError::RendererSpawn(e) | PrintError::Io(e) => Some(e.to_string()),
            PrintError::PrinterList(msg)
            | PrintError::SetDefaultPrinter(msg)
            | PrintError::Internal(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}
