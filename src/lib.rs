//! Local print agent for point-of-sale terminals.
//!
//! Accepts HTML receipts over a localhost HTTP API, queues them, and prints
//! them one at a time through an external silent-printing renderer.

pub mod aliases;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod printers;
pub mod queue;
pub mod registry;
pub mod web;

pub use error::{AdmissionError, PrintError};
pub use executor::{HtmlPrintExecutor, JobRunner};
pub use job::{Job, JobRecord, JobStatus, PrintRequest};
pub use printers::{InMemoryPrinters, PrinterBackend, SystemPrinters};
pub use queue::PrintQueue;
