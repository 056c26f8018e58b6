// src/job.rs - Print job model and admission-time validation
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::aliases::PrinterAliases;
use crate::error::AdmissionError;

pub const DEFAULT_LABEL: &str = "pdv-receipt";
pub const MAX_LABEL_LEN: usize = 60;

/// Lifecycle of a job. Transitions only move forward:
/// `Queued -> Printing -> {Done, Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Printing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Printing)
                | (JobStatus::Printing, JobStatus::Done)
                | (JobStatus::Printing, JobStatus::Error)
        )
    }
}

/// Body of `POST /print`. `html` and `jobName` are accepted for older callers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRequest {
    #[serde(default, alias = "html")]
    pub content: Option<String>,
    /// Non-string values are ignored and mean "system default".
    #[serde(default, deserialize_with = "string_or_none")]
    pub printer_name: Option<String>,
    #[serde(default)]
    pub copies: Option<Value>,
    /// Non-string values are ignored and fall back to the default label.
    #[serde(default, alias = "jobName", deserialize_with = "string_or_none")]
    pub label: Option<String>,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

impl PrintRequest {
    /// Parse a decoded JSON body. Anything but an object is `invalid-payload`.
    pub fn from_json(value: Value) -> Result<Self, AdmissionError> {
        if !value.is_object() {
            return Err(AdmissionError::InvalidPayload);
        }
        serde_json::from_value(value).map_err(|_| AdmissionError::InvalidPayload)
    }
}

/// A validated, admitted unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub content: String,
    /// Printer name after alias resolution; `None` uses the system default.
    pub printer_name: Option<String>,
    /// Printer name as the caller sent it.
    pub requested_printer: Option<String>,
    pub copies: u32,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Validate a request and build a job with a fresh id.
    pub fn from_request(
        request: PrintRequest,
        aliases: &PrinterAliases,
        max_copies: u32,
    ) -> Result<Self, AdmissionError> {
        let content = request.content.as_deref().map(str::trim).unwrap_or_default();
        if content.is_empty() {
            return Err(AdmissionError::MissingContent);
        }
        let requested = request
            .printer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let printer_name = requested.as_deref().and_then(|name| aliases.resolve(name));

        Ok(Self {
            id: new_job_id(),
            content: content.to_string(),
            printer_name,
            requested_printer: requested,
            copies: clamp_copies(request.copies.as_ref(), max_copies),
            label: sanitize_label(request.label.as_deref().unwrap_or(DEFAULT_LABEL)),
            created_at: Utc::now(),
        })
    }

    /// Display name of the target printer for logs.
    pub fn printer_label(&self) -> &str {
        self.printer_name.as_deref().unwrap_or("default")
    }
}

/// Status view of a job, as kept in the registry and returned by `/jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub label: String,
    pub printer_name: String,
    pub requested_printer: Option<String>,
    pub copies: u32,
    pub status: JobStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            label: job.label.clone(),
            printer_name: job.printer_name.clone().unwrap_or_default(),
            requested_printer: job.requested_printer.clone(),
            copies: job.copies,
            status: JobStatus::Queued,
            created_at: job.created_at,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Clamp a caller-supplied copy count into `[1, max_copies]`.
///
/// Numbers and numeric strings are accepted and truncated; anything else,
/// including a missing value, means one copy.
pub fn clamp_copies(raw: Option<&Value>, max_copies: u32) -> u32 {
    let max_copies = max_copies.max(1);
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => n.clamp(1.0, f64::from(max_copies)) as u32,
        _ => 1,
    }
}

/// Make a label safe for use inside a file name.
///
/// Each run of reserved characters becomes one `_`, runs of whitespace and
/// dashes become one `-`, and the result is cut to [`MAX_LABEL_LEN`]
/// characters. Underscores the caller typed are kept as-is.
pub fn sanitize_label(raw: &str) -> String {
    const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let mut out = String::with_capacity(raw.len());
    let mut in_reserved_run = false;
    for c in raw.trim().chars() {
        if RESERVED.contains(&c) || (c.is_control() && !c.is_whitespace()) {
            if !in_reserved_run {
                out.push('_');
            }
            in_reserved_run = true;
            continue;
        }
        in_reserved_run = false;
        if c.is_whitespace() || c == '-' {
            if !out.ends_with('-') {
                out.push('-');
            }
        } else {
            out.push(c);
        }
    }

    let truncated: String = out.chars().take(MAX_LABEL_LEN).collect();
    if truncated.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> PrintRequest {
        PrintRequest::from_json(value).unwrap()
    }

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Printing));
        assert!(JobStatus::Printing.can_transition_to(JobStatus::Done));
        assert!(JobStatus::Printing.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Printing));
        assert!(!JobStatus::Error.can_transition_to(JobStatus::Queued));
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::Printing.is_terminal());
    }

    #[test]
    fn non_object_payload_is_invalid() {
        assert_eq!(PrintRequest::from_json(json!([1, 2])).unwrap_err(), AdmissionError::InvalidPayload);
        assert_eq!(PrintRequest::from_json(Value::Null).unwrap_err(), AdmissionError::InvalidPayload);
        assert_eq!(
            PrintRequest::from_json(json!({"content": 42})).unwrap_err(),
            AdmissionError::InvalidPayload
        );
    }

    #[test]
    fn blank_content_is_rejected() {
        let aliases = PrinterAliases::default();
        let err = Job::from_request(request(json!({"content": "   "})), &aliases, 10).unwrap_err();
        assert_eq!(err, AdmissionError::MissingContent);
        let err = Job::from_request(request(json!({"copies": 2})), &aliases, 10).unwrap_err();
        assert_eq!(err, AdmissionError::MissingContent);
    }

    #[test]
    fn legacy_field_names_are_accepted() {
        let aliases = PrinterAliases::default();
        let job = Job::from_request(
            request(json!({"html": "<p>oi</p>", "jobName": "Pedido 12"})),
            &aliases,
            10,
        )
        .unwrap();
        assert_eq!(job.content, "<p>oi</p>");
        assert_eq!(job.label, "Pedido-12");
        assert_eq!(job.printer_name, None);
    }

    #[test]
    fn non_string_printer_and_label_are_ignored() {
        let aliases = PrinterAliases::default();
        let job = Job::from_request(
            request(json!({"content": "<p>x</p>", "printerName": 5, "label": ["a"]})),
            &aliases,
            10,
        )
        .unwrap();
        assert_eq!(job.printer_name, None);
        assert_eq!(job.requested_printer, None);
        assert_eq!(job.label, DEFAULT_LABEL);

        let job = Job::from_request(request(json!({"html": "<p>x</p>", "jobName": null})), &aliases, 10).unwrap();
        assert_eq!(job.label, DEFAULT_LABEL);
    }

    #[test]
    fn printer_name_goes_through_aliases() {
        let aliases = PrinterAliases::from_entries([("caixa", "EPSON TM-T20")]).unwrap();
        let job = Job::from_request(
            request(json!({"content": "x", "printerName": " caixa "})),
            &aliases,
            10,
        )
        .unwrap();
        assert_eq!(job.printer_name.as_deref(), Some("EPSON TM-T20"));
        assert_eq!(job.requested_printer.as_deref(), Some("caixa"));
        assert_eq!(job.printer_label(), "EPSON TM-T20");
    }

    #[test]
    fn copies_are_clamped() {
        assert_eq!(clamp_copies(None, 10), 1);
        assert_eq!(clamp_copies(Some(&json!(3)), 10), 3);
        assert_eq!(clamp_copies(Some(&json!(0)), 10), 1);
        assert_eq!(clamp_copies(Some(&json!(-4)), 10), 1);
        assert_eq!(clamp_copies(Some(&json!(500)), 10), 10);
        assert_eq!(clamp_copies(Some(&json!("4")), 10), 4);
        assert_eq!(clamp_copies(Some(&json!(2.7)), 10), 2);
        assert_eq!(clamp_copies(Some(&json!("lots")), 10), 1);
        assert_eq!(clamp_copies(Some(&json!(true)), 10), 1);
    }

    #[test]
    fn labels_are_sanitized() {
        assert_eq!(sanitize_label("Pedido #12 / Mesa 4"), "Pedido-#12-_-Mesa-4");
        assert_eq!(sanitize_label("a<>:b"), "a_b");
        assert_eq!(sanitize_label("a   -  b"), "a-b");
        assert_eq!(sanitize_label("a__b"), "a__b");
        assert_eq!(sanitize_label("a/_?b"), "a___b");
        assert_eq!(sanitize_label("linha\tdois"), "linha-dois");
        assert_eq!(sanitize_label("   "), DEFAULT_LABEL);
        assert_eq!(sanitize_label(&"x".repeat(100)).len(), MAX_LABEL_LEN);
    }

    #[test]
    fn job_ids_are_unique() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn record_serializes_with_camel_case_and_millis() {
        let aliases = PrinterAliases::default();
        let job = Job::from_request(request(json!({"content": "x"})), &aliases, 10).unwrap();
        let record = JobRecord::from(&job);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "queued");
        assert_eq!(value["printerName"], "");
        assert!(value["createdAt"].is_i64());
        assert!(value["startedAt"].is_null());
        assert!(value["error"].is_null());
    }
}
