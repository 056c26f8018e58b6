//! Printer Resource Accessor.
//!
//! Lists installed printers and reads/sets the machine-wide default printer.
//! Switching the default is done through [`DefaultPrinterLease`], which
//! remembers the previous default and puts it back on release.

mod memory;
mod system;

pub use memory::InMemoryPrinters;
pub use system::SystemPrinters;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::error::PrintError;

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("failed to run printer command: {0}")]
    Io(#[from] std::io::Error),
    #[error("printer command failed: {0}")]
    Command(String),
}

/// Access to the OS printer subsystem.
#[async_trait]
pub trait PrinterBackend: Send + Sync + 'static {
    async fn list_printers(&self) -> Result<Vec<String>, PrinterError>;
    /// The current default printer, if the OS has one.
    async fn default_printer(&self) -> Result<Option<String>, PrinterError>;
    async fn set_default_printer(&self, name: &str) -> Result<(), PrinterError>;
}

/// The default printer, temporarily pointed at a job's target.
///
/// Finish it with [`DefaultPrinterLease::release`]. A lease dropped without
/// release (cancelled or panicking job) restores the default from a spawned task.
pub struct DefaultPrinterLease {
    backend: Arc<dyn PrinterBackend>,
    target: String,
    previous: Option<String>,
    switched: bool,
    released: bool,
}

impl DefaultPrinterLease {
    /// Read the current default, then switch it to `target`.
    pub async fn acquire(backend: Arc<dyn PrinterBackend>, target: &str) -> Result<Self, PrintError> {
        let previous = match backend.default_printer().await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read default printer; it will not be restored");
                None
            }
        };

        let mut lease = Self {
            backend: backend.clone(),
            target: target.to_string(),
            previous,
            switched: false,
            released: false,
        };

        if lease.previous.as_deref() == Some(target) {
            return Ok(lease);
        }

        lease.switched = true;
        if let Err(e) = backend.set_default_printer(target).await {
            // The switch may have half-applied; put the old default back.
            lease.release().await;
            return Err(PrintError::SetDefaultPrinter(e.to_string()));
        }
        tracing::debug!(printer = %target, previous = ?lease.previous, "Default printer switched");
        Ok(lease)
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// Restore the previous default. Failures are logged, not returned.
    pub async fn release(mut self) {
        if !self.switched {
            return;
        }
        let Some(previous) = self.previous.clone() else {
            return;
        };
        let restored = self.backend.set_default_printer(&previous).await;
        // Only now: if this future is dropped mid-restore, Drop retries.
        self.released = true;
        match restored {
            Ok(()) => tracing::debug!(printer = %previous, "Default printer restored"),
            Err(e) => tracing::error!(
                printer = %previous,
                job_printer = %self.target,
                error = %e,
                "Failed to restore default printer"
            ),
        }
    }
}

impl Drop for DefaultPrinterLease {
    fn drop(&mut self) {
        if self.released || !self.switched {
            return;
        }
        let Some(previous) = self.previous.take() else {
            return;
        };
        tracing::warn!(printer = %previous, job_printer = %self.target, "Default printer lease dropped, restoring");
        let backend = self.backend.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = backend.set_default_printer(&previous).await {
                        tracing::error!(printer = %previous, error = %e, "Failed to restore default printer");
                    }
                });
            }
            Err(_) => tracing::error!(printer = %previous, "No runtime left to restore default printer"),
        }
    }
}
