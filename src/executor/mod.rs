//! Render-and-Print Executor.
//!
//! Turns one [`Job`] into `copies` physical printouts by writing its HTML to a
//! throw-away directory and driving the external renderer in silent-print
//! mode, one renderer run per copy.

pub mod bootstrap;
pub mod process;
pub mod renderer;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, RendererConfig};
use crate::error::PrintError;
use crate::job::Job;
use crate::printers::{DefaultPrinterLease, PrinterBackend};

/// Something that can carry out one admitted job to completion.
///
/// The queue awaits `run` to completion before starting the next job.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: &Job) -> Result<(), PrintError>;
}

/// Prints HTML jobs through an external silent-printing renderer.
pub struct HtmlPrintExecutor {
    printers: Arc<dyn PrinterBackend>,
    renderer: RendererConfig,
    print_wait: Duration,
}

impl HtmlPrintExecutor {
    pub fn new(printers: Arc<dyn PrinterBackend>, renderer: RendererConfig, print_wait: Duration) -> Self {
        Self { printers, renderer, print_wait }
    }

    pub fn from_config(printers: Arc<dyn PrinterBackend>, config: &Config) -> Self {
        Self::new(printers, config.renderer.clone(), config.queue.print_wait())
    }

    fn ensure_profile_dir(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.renderer.profile_dir) {
            tracing::warn!(
                dir = %self.renderer.profile_dir.display(),
                error = %e,
                "Could not create renderer profile directory"
            );
        }
    }

    async fn print_document(&self, job: &Job, document: &Path) -> Result<(), PrintError> {
        let program = renderer::find_renderer(&self.renderer).ok_or(PrintError::RendererNotFound)?;

        if let Some(target) = job.printer_name.as_deref() {
            let installed = self
                .printers
                .list_printers()
                .await
                .map_err(|e| PrintError::PrinterList(e.to_string()))?;
            if !installed.iter().any(|name| name == target) {
                return Err(PrintError::PrinterNotFound);
            }
        }

        self.ensure_profile_dir();
        let args = renderer::build_args(&self.renderer.args, document, &self.renderer.profile_dir);

        let lease = match job.printer_name.as_deref() {
            Some(target) => Some(DefaultPrinterLease::acquire(self.printers.clone(), target).await?),
            None => None,
        };
        let outcome = self.print_copies(job, &program, &args).await;
        if let Some(lease) = lease {
            lease.release().await;
        }
        outcome
    }

    async fn print_copies(&self, job: &Job, program: &Path, args: &[String]) -> Result<(), PrintError> {
        for copy in 1..=job.copies {
            tracing::debug!(id = %job.id, copy, copies = job.copies, "Launching renderer");
            process::run_renderer(program, args, self.print_wait).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobRunner for HtmlPrintExecutor {
    async fn run(&self, job: &Job) -> Result<(), PrintError> {
        // Removed on drop, whichever way this function returns.
        let workdir = tempfile::Builder::new().prefix("pdv-agent-").tempdir()?;
        let document = workdir.path().join(format!("{}-{}.html", job.label, job.id));
        tokio::fs::write(&document, bootstrap::inject_auto_print(&job.content)).await?;

        let outcome = self.print_document(job, &document).await;

        if let Err(e) = workdir.close() {
            tracing::warn!(id = %job.id, error = %e, "Failed to remove job working directory");
        }
        outcome
    }
}
