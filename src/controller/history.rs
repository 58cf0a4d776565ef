use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use strum::Display;
use uuid::Uuid;

pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// What triggered a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionKind {
    Startup,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// A command was sent and accepted
    Success,
    /// Nothing needed doing
    Skipped,
    Failure,
}

/// Outcome of one reconciliation of one site
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub site_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_group_id: Option<Uuid>,
    pub kind: ExecutionKind,
    pub status: ExecutionStatus,
    pub details: String,
    pub at: DateTime<Utc>,
}

/// Bounded log of recent executions, oldest dropped first
#[derive(Debug)]
pub struct ExecutionHistory {
    capacity: usize,
    records: Mutex<VecDeque<ExecutionRecord>>,
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ExecutionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn push(&self, record: ExecutionRecord) {
        let mut records = self.records.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Newest first, optionally for one site only
    pub fn recent(&self, site_id: Option<&str>, limit: usize) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .filter(|r| site_id.map_or(true, |id| r.site_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
