//! Defines the Axum API routes and handlers.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Request, State, rejection::BytesRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;

use crate::error::AdmissionError;
use crate::job::PrintRequest;
use crate::printers::PrinterBackend;
use crate::queue::PrintQueue;
use crate::web::models::{
    ErrorResponse, HealthResponse, JobResponse, PrintAccepted, PrintersResponse, QueueHealth, QueueResponse,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppStateInner {
    pub queue: PrintQueue,
    pub printers: Arc<dyn PrinterBackend>,
    pub max_body_bytes: usize,
}
pub type AppState = Arc<AppStateInner>;

/// Helper to create a JSON error response with a code and status.
fn json_error(error: &str, status: StatusCode) -> Response {
    let body = ErrorResponse { ok: false, error: error.to_string() };
    (status, Json(body)).into_response()
}

fn admission_error(error: AdmissionError) -> Response {
    let status = match error {
        AdmissionError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
        AdmissionError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    };
    json_error(&error.to_string(), status)
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    let max_body = state.max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/printers", get(list_printers))
        .route("/print", post(submit_print))
        .route("/queue", get(queue_status))
        .route("/jobs/", get(missing_job_id))
        .route("/jobs/{id}", get(job_status))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Browsers call the agent from the storefront origin; answer preflights
/// directly and stamp CORS headers on everything else.
async fn cors(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET,POST,OPTIONS"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    response
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.queue.snapshot();
    Json(HealthResponse {
        ok: true,
        version: VERSION,
        queue: QueueHealth {
            pending: snapshot.queued,
            processing: snapshot.active.map(|job| job.id),
        },
    })
}

async fn list_printers(State(state): State<AppState>) -> Response {
    match state.printers.list_printers().await {
        Ok(printers) => Json(PrintersResponse { ok: true, printers }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list printers");
            json_error(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Admit a print job. The response only says the job was queued; callers
/// poll `/jobs/{id}` for the outcome.
async fn submit_print(State(state): State<AppState>, body: Result<Bytes, BytesRejection>) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return admission_error(AdmissionError::PayloadTooLarge);
        }
        Err(_) => return admission_error(AdmissionError::InvalidPayload),
    };
    if body.iter().all(u8::is_ascii_whitespace) {
        return admission_error(AdmissionError::InvalidPayload);
    }
    let value = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => value,
        Err(_) => return admission_error(AdmissionError::InvalidJson),
    };

    match PrintRequest::from_json(value).and_then(|request| state.queue.enqueue(request)) {
        Ok(job_id) => Json(PrintAccepted { ok: true, queued: true, job_id }).into_response(),
        Err(e) => admission_error(e),
    }
}

async fn queue_status(State(state): State<AppState>) -> Json<QueueResponse> {
    let snapshot = state.queue.snapshot();
    Json(QueueResponse {
        ok: true,
        queued: snapshot.queued,
        active: snapshot.active,
    })
}

async fn job_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = id.trim();
    if id.is_empty() {
        return missing_job_id().await;
    }
    match state.queue.job(id) {
        Some(job) => Json(JobResponse { ok: true, job }).into_response(),
        None => json_error("job-not-found", StatusCode::NOT_FOUND),
    }
}

async fn missing_job_id() -> Response {
    json_error("invalid-job-id", StatusCode::BAD_REQUEST)
}

async fn not_found() -> Response {
    json_error("not-found", StatusCode::NOT_FOUND)
}
