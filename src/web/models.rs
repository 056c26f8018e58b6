//! Contains the data models for API responses.

use serde::Serialize;

use crate::job::JobRecord;
use crate::queue::ActiveJob;

/// `GET /health`
#[derive(Serialize, Debug, Clone)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
    pub queue: QueueHealth,
}

#[derive(Serialize, Debug, Clone)]
pub struct QueueHealth {
    pub pending: usize,
    /// Id of the job being printed, if any.
    pub processing: Option<String>,
}

/// `GET /printers`
#[derive(Serialize, Debug, Clone)]
pub struct PrintersResponse {
    pub ok: bool,
    pub printers: Vec<String>,
}

/// `POST /print` on admission.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PrintAccepted {
    pub ok: bool,
    pub queued: bool,
    pub job_id: String,
}

/// `GET /queue`
#[derive(Serialize, Debug, Clone)]
pub struct QueueResponse {
    pub ok: bool,
    pub queued: usize,
    pub active: Option<ActiveJob>,
}

/// `GET /jobs/{id}`
#[derive(Serialize, Debug, Clone)]
pub struct JobResponse {
    pub ok: bool,
    pub job: JobRecord,
}

/// Any failed call.
#[derive(Serialize, Debug, Clone)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}
