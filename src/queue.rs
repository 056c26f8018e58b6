//! Job Queue & Scheduler.
//!
//! Admission appends to a bounded FIFO and records the job in the registry.
//! One drain worker task takes jobs off the front and runs each to
//! completion before looking at the next, so at most one job is ever
//! printing. Printing switches the OS default printer, which cannot be
//! shared between concurrent jobs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::aliases::PrinterAliases;
use crate::config::QueueConfig;
use crate::error::{AdmissionError, PrintError};
use crate::executor::JobRunner;
use crate::job::{Job, JobRecord, JobStatus, PrintRequest};
use crate::registry::{JobRegistry, RegistryError};

/// The job currently being printed, as shown by `GET /queue`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJob {
    pub id: String,
    pub label: String,
    pub printer_name: String,
    pub copies: u32,
    pub status: JobStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    /// Jobs admitted but not yet started.
    pub queued: usize,
    pub active: Option<ActiveJob>,
}

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Job>,
    registry: JobRegistry,
    active: Option<ActiveJob>,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    limits: QueueConfig,
    aliases: PrinterAliases,
    worker_started: AtomicBool,
    closing: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the next job and mark it printing, atomically.
    fn begin_next(&self) -> Option<Job> {
        let mut state = self.lock();
        let job = state.pending.pop_front()?;
        let started_at = Utc::now();
        log_registry_miss(state.registry.mark_printing(&job.id, started_at));
        state.active = Some(ActiveJob {
            id: job.id.clone(),
            label: job.label.clone(),
            printer_name: job.printer_name.clone().unwrap_or_default(),
            copies: job.copies,
            status: JobStatus::Printing,
            started_at,
        });
        Some(job)
    }

    fn finish(&self, job: &Job, result: &Result<(), PrintError>) {
        let mut state = self.lock();
        let finished_at = Utc::now();
        let update = match result {
            Ok(()) => state.registry.mark_done(&job.id, finished_at),
            Err(e) => state.registry.mark_error(&job.id, finished_at, e.to_string()),
        };
        log_registry_miss(update);
        state.active = None;
    }
}

fn log_registry_miss(result: Result<(), RegistryError>) {
    match result {
        Ok(()) => {}
        // Evicted while still pending: nothing left to update.
        Err(RegistryError::UnknownJob(id)) => tracing::debug!(id = %id, "Job no longer tracked"),
        Err(e) => tracing::error!(error = %e, "Job registry rejected transition"),
    }
}

/// Handle to the process-wide print queue. Cheap to clone.
#[derive(Clone)]
pub struct PrintQueue {
    shared: Arc<Shared>,
}

impl PrintQueue {
    /// Create an idle queue. Nothing is printed until a worker is spawned.
    pub fn new(limits: QueueConfig, aliases: PrinterAliases) -> Self {
        let shared = Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::with_capacity(limits.queue_max),
                registry: JobRegistry::new(limits.max_tracked),
                active: None,
            }),
            wake: Notify::new(),
            limits,
            aliases,
            worker_started: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        };
        Self { shared: Arc::new(shared) }
    }

    /// Create a queue and start its drain worker.
    pub fn start(limits: QueueConfig, aliases: PrinterAliases, runner: Arc<dyn JobRunner>) -> (Self, JoinHandle<()>) {
        let queue = Self::new(limits, aliases);
        queue.shared.worker_started.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(drain(queue.shared.clone(), runner));
        (queue, handle)
    }

    /// Start the drain worker. Returns `None` if one is already running;
    /// there is never more than one.
    pub fn spawn_worker(&self, runner: Arc<dyn JobRunner>) -> Option<JoinHandle<()>> {
        if self.shared.worker_started.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(tokio::spawn(drain(self.shared.clone(), runner)))
    }

    /// Admit a print request. Never blocks on printing.
    pub fn enqueue(&self, request: PrintRequest) -> Result<String, AdmissionError> {
        let job = Job::from_request(request, &self.shared.aliases, self.shared.limits.max_copies)?;
        let id = job.id.clone();
        {
            let mut state = self.shared.lock();
            if self.shared.closing.load(Ordering::SeqCst) {
                return Err(AdmissionError::ShuttingDown);
            }
            if state.pending.len() >= self.shared.limits.queue_max {
                tracing::warn!(queued = state.pending.len(), "Print queue full, rejecting job");
                return Err(AdmissionError::QueueFull);
            }
            for evicted in state.registry.insert(JobRecord::from(&job)) {
                tracing::debug!(id = %evicted, "Evicted oldest job from registry");
            }
            tracing::info!(
                id = %job.id,
                name = %job.label,
                printer = %job.printer_label(),
                copies = job.copies,
                queued = state.pending.len() + 1,
                "Print job queued"
            );
            state.pending.push_back(job);
        }
        self.shared.wake.notify_one();
        Ok(id)
    }

    /// Status of a tracked job.
    pub fn job(&self, id: &str) -> Option<JobRecord> {
        self.shared.lock().registry.get(id).cloned()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.shared.lock();
        QueueSnapshot {
            queued: state.pending.len(),
            active: state.active.clone(),
        }
    }

    pub fn limits(&self) -> &QueueConfig {
        &self.shared.limits
    }

    /// Refuse new admissions and let the worker stop once the job in
    /// flight, if any, has finished. Jobs still pending are not printed.
    pub fn shutdown(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
    }
}

/// The single drain loop: print jobs one at a time, in admission order,
/// then sleep until the next admission or shutdown.
async fn drain(shared: Arc<Shared>, runner: Arc<dyn JobRunner>) {
    loop {
        if shared.closing.load(Ordering::SeqCst) {
            let dropped = shared.lock().pending.len();
            tracing::info!(dropped, "Print worker stopped");
            return;
        }
        let Some(job) = shared.begin_next() else {
            shared.wake.notified().await;
            continue;
        };

        tracing::info!(
            id = %job.id,
            name = %job.label,
            printer = %job.printer_label(),
            copies = job.copies,
            "Print started"
        );
        let started = Instant::now();

        // A panicking runner fails this job instead of taking the worker down.
        let task = {
            let runner = runner.clone();
            let job = job.clone();
            tokio::spawn(async move { runner.run(&job).await })
        };
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(PrintError::Internal(e.to_string())),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::info!(id = %job.id, name = %job.label, elapsed_ms, "Print done"),
            Err(PrintError::PrintTimeout) => {
                tracing::error!(id = %job.id, name = %job.label, elapsed_ms, "Print timeout")
            }
            Err(e) => tracing::error!(
                id = %job.id,
                name = %job.label,
                elapsed_ms,
                error = %e,
                detail = ?e.detail(),
                "Print failed"
            ),
        }
        shared.finish(&job, &result);
    }
}
