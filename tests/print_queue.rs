//! Integration tests for admission, ordering and single-flight draining.

use async_trait::async_trait;
use pdv_print_agent::aliases::PrinterAliases;
use pdv_print_agent::config::QueueConfig;
use pdv_print_agent::{AdmissionError, Job, JobRecord, JobRunner, JobStatus, PrintError, PrintQueue, PrintRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn request(label: &str) -> PrintRequest {
    PrintRequest {
        content: Some("<html><body><p>Pedido</p></body></html>".to_string()),
        label: Some(label.to_string()),
        ..Default::default()
    }
}

fn limits(queue_max: usize, max_tracked: usize) -> QueueConfig {
    QueueConfig { queue_max, max_tracked, ..QueueConfig::default() }
}

async fn wait_for_terminal(queue: &PrintQueue, id: &str) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = queue.job(id) {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not finish in time")
}

async fn wait_until_active(queue: &PrintQueue) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.snapshot().active.is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker never picked up a job");
}

/// Records the order jobs start in and how many run at once.
#[derive(Default)]
struct RecordingRunner {
    started: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl JobRunner for RecordingRunner {
    async fn run(&self, job: &Job) -> Result<(), PrintError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.lock().unwrap().push(job.label.clone());
        tokio::time::sleep(Duration::from_millis(15)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match job.label.as_str() {
            "missing-printer" => Err(PrintError::PrinterNotFound),
            "explodes" => panic!("renderer crashed"),
            _ => Ok(()),
        }
    }
}

/// Never finishes until released.
struct HungRunner {
    release: Notify,
}

#[async_trait]
impl JobRunner for HungRunner {
    async fn run(&self, _job: &Job) -> Result<(), PrintError> {
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn jobs_print_in_admission_order_one_at_a_time() {
    let runner = Arc::new(RecordingRunner::default());
    let (queue, _worker) = PrintQueue::start(limits(50, 200), PrinterAliases::default(), runner.clone());

    let labels: Vec<String> = (0..6).map(|i| format!("job-{}", i)).collect();
    let ids: Vec<String> = labels.iter().map(|l| queue.enqueue(request(l)).unwrap()).collect();

    for id in &ids {
        let job = wait_for_terminal(&queue, id).await;
        assert_eq!(job.status, JobStatus::Done);
        let started = job.started_at.unwrap();
        let finished = job.finished_at.unwrap();
        assert!(started <= finished);
        assert!(job.created_at <= started);
        assert!(job.error.is_none());
    }

    assert_eq!(*runner.started.lock().unwrap(), labels);
    assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.queued, 0);
    assert!(snapshot.active.is_none());
}

#[tokio::test]
async fn admission_beyond_bound_is_rejected_without_creating_a_job() {
    let queue = PrintQueue::new(limits(3, 200), PrinterAliases::default());
    for i in 0..3 {
        queue.enqueue(request(&format!("job-{}", i))).unwrap();
    }
    let err = queue.enqueue(request("overflow")).unwrap_err();
    assert_eq!(err, AdmissionError::QueueFull);
    assert_eq!(queue.snapshot().queued, 3);
}

#[tokio::test]
async fn queue_full_while_a_job_hangs() {
    let runner = Arc::new(HungRunner { release: Notify::new() });
    let (queue, _worker) = PrintQueue::start(limits(2, 200), PrinterAliases::default(), runner.clone());

    let first = queue.enqueue(request("hangs")).unwrap();
    wait_until_active(&queue).await;
    assert_eq!(queue.job(&first).unwrap().status, JobStatus::Printing);

    let second = queue.enqueue(request("waiting-1")).unwrap();
    queue.enqueue(request("waiting-2")).unwrap();
    assert_eq!(queue.enqueue(request("rejected")).unwrap_err(), AdmissionError::QueueFull);

    // Nothing behind the hung job has started.
    assert_eq!(queue.job(&second).unwrap().status, JobStatus::Queued);
    assert_eq!(queue.snapshot().active.unwrap().id, first);

    runner.release.notify_one();
    assert_eq!(wait_for_terminal(&queue, &first).await.status, JobStatus::Done);
}

#[tokio::test]
async fn execution_failures_are_recorded_not_propagated() {
    let runner = Arc::new(RecordingRunner::default());
    let (queue, _worker) = PrintQueue::start(limits(10, 200), PrinterAliases::default(), runner);

    let bad = queue.enqueue(request("missing-printer")).unwrap();
    let crashed = queue.enqueue(request("explodes")).unwrap();
    let good = queue.enqueue(request("fine")).unwrap();

    let bad = wait_for_terminal(&queue, &bad).await;
    assert_eq!(bad.status, JobStatus::Error);
    assert_eq!(bad.error.as_deref(), Some("printer-not-found"));
    assert!(bad.finished_at.is_some());

    let crashed = wait_for_terminal(&queue, &crashed).await;
    assert_eq!(crashed.status, JobStatus::Error);
    assert_eq!(crashed.error.as_deref(), Some("internal-error"));

    // The worker keeps draining after a failure.
    assert_eq!(wait_for_terminal(&queue, &good).await.status, JobStatus::Done);
}

#[tokio::test]
async fn registry_drops_oldest_admitted_job() {
    let queue = PrintQueue::new(limits(10, 2), PrinterAliases::default());
    let first = queue.enqueue(request("a")).unwrap();
    let second = queue.enqueue(request("b")).unwrap();
    let third = queue.enqueue(request("c")).unwrap();

    assert!(queue.job(&first).is_none());
    assert!(queue.job(&second).is_some());
    assert!(queue.job(&third).is_some());
    // Eviction from the registry does not drop the job from the queue.
    assert_eq!(queue.snapshot().queued, 3);
}

#[tokio::test]
async fn invalid_requests_never_reach_the_queue() {
    let queue = PrintQueue::new(limits(10, 10), PrinterAliases::default());
    let err = queue.enqueue(PrintRequest::default()).unwrap_err();
    assert_eq!(err, AdmissionError::MissingContent);
    assert_eq!(queue.snapshot().queued, 0);
}

#[tokio::test]
async fn aliases_are_applied_at_admission() {
    let aliases = PrinterAliases::from_entries([("caixa", "EPSON TM-T20")]).unwrap();
    let queue = PrintQueue::new(limits(10, 10), aliases);
    let id = queue
        .enqueue(PrintRequest {
            printer_name: Some("caixa".to_string()),
            ..request("alias")
        })
        .unwrap();
    let job = queue.job(&id).unwrap();
    assert_eq!(job.printer_name, "EPSON TM-T20");
    assert_eq!(job.requested_printer.as_deref(), Some("caixa"));
}

#[tokio::test]
async fn only_one_worker_can_be_spawned() {
    let queue = PrintQueue::new(limits(10, 10), PrinterAliases::default());
    let runner: Arc<dyn JobRunner> = Arc::new(RecordingRunner::default());
    let first = queue.spawn_worker(runner.clone());
    assert!(first.is_some());
    assert!(queue.spawn_worker(runner).is_none());

    let id = queue.enqueue(request("late")).unwrap();
    assert_eq!(wait_for_terminal(&queue, &id).await.status, JobStatus::Done);
}

#[tokio::test]
async fn shutdown_finishes_job_in_flight_and_refuses_new_ones() {
    let runner = Arc::new(HungRunner { release: Notify::new() });
    let (queue, worker) = PrintQueue::start(limits(10, 200), PrinterAliases::default(), runner.clone());

    let first = queue.enqueue(request("in-flight")).unwrap();
    wait_until_active(&queue).await;
    let pending = queue.enqueue(request("pending")).unwrap();

    queue.shutdown();
    assert_eq!(queue.enqueue(request("late")).unwrap_err(), AdmissionError::ShuttingDown);
    assert!(!worker.is_finished());

    runner.release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), worker).await.unwrap().unwrap();

    assert_eq!(queue.job(&first).unwrap().status, JobStatus::Done);
    assert_eq!(queue.job(&pending).unwrap().status, JobStatus::Queued);
}
