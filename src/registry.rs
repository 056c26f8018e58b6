// src/registry.rs - Bounded history of job status, evicted oldest-first
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

use crate::job::{JobRecord, JobStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job {0} is not tracked")]
    UnknownJob(String),
    #[error("invalid state transition for job {id}: {from:?} -> {to:?}")]
    InvalidTransition { id: String, from: JobStatus, to: JobStatus },
}

/// Job Registry: the most recently admitted jobs, keyed by id.
///
/// Never holds more than `capacity` entries. When a new entry pushes it over,
/// the entry admitted earliest is dropped whatever its status.
#[derive(Debug)]
pub struct JobRegistry {
    entries: HashMap<String, JobRecord>,
    order: VecDeque<String>,
    capacity: usize,
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Track a newly admitted job. Returns the ids evicted to stay in bounds.
    pub fn insert(&mut self, record: JobRecord) -> Vec<String> {
        let id = record.id.clone();
        if self.entries.insert(id.clone(), record).is_none() {
            self.order.push_back(id);
        }
        let mut evicted = Vec::new();
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn get(&self, id: &str) -> Option<&JobRecord> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `queued -> printing`, stamping `startedAt`.
    pub fn mark_printing(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        self.transition(id, JobStatus::Printing, |record| record.started_at = Some(at))
    }

    /// `printing -> done`, stamping `finishedAt`.
    pub fn mark_done(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        self.transition(id, JobStatus::Done, |record| record.finished_at = Some(at))
    }

    /// `printing -> error`, stamping `finishedAt` and the failure reason.
    pub fn mark_error(&mut self, id: &str, at: DateTime<Utc>, reason: String) -> Result<(), RegistryError> {
        self.transition(id, JobStatus::Error, |record| {
            record.finished_at = Some(at);
            record.error = Some(reason);
        })
    }

    fn transition<F>(&mut self, id: &str, to: JobStatus, apply: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let record = self
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownJob(id.to_string()))?;
        if !record.status.can_transition_to(to) {
            return Err(RegistryError::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to,
            });
        }
        record.status = to;
        apply(record);
        Ok(())
    }
}
