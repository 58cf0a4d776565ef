//! Schedule import/export file format
//!
//! A file is a JSON array with one object per schedule group, using the same
//! camelCase field names as the REST API. Derived values (effective percents,
//! weather override flag) are never written. Unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::domain::{FieldIssue, Schedule, ScheduleDraft};

pub const DEFAULT_MAX_RECORDS: usize = 100;

/// Why a file could not be parsed, with as precise a locator as available
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseError {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// 1-based position of the offending record in the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

impl ParseError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            line: None,
            column: None,
            record: None,
            issues: Vec::new(),
        }
    }

    fn in_record(mut self, record: usize, line: Option<usize>) -> Self {
        self.record = Some(record);
        self.line = line;
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)?;
        match (self.record, self.line, self.column) {
            (Some(r), Some(l), _) => write!(f, " (record {r}, line {l})")?,
            (Some(r), None, _) => write!(f, " (record {r})")?,
            (None, Some(l), Some(c)) => write!(f, " (line {l}, column {c})")?,
            (None, Some(l), None) => write!(f, " (line {l})")?,
            _ => {}
        }
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Site given to records that do not name one
    pub default_site_id: Option<String>,
    /// When set, records naming any other site are rejected
    pub known_site_ids: Option<Vec<String>>,
    pub max_records: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_site_id: None,
            known_site_ids: None,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

pub fn parse(bytes: &[u8]) -> Result<Vec<Schedule>, ParseError> {
    parse_with(bytes, &ParseOptions::default(), Utc::now())
}

/// Parses and validates every record. Any failure rejects the whole file.
///
/// Records without `scheduleGroupId` get a fresh id; records without
/// `updatedAt` are stamped with `now`.
pub fn parse_with(
    bytes: &[u8],
    options: &ParseOptions,
    now: DateTime<Utc>,
) -> Result<Vec<Schedule>, ParseError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::new("Import file is empty"));
    }

    let records: Vec<serde_json::Value> = serde_json::from_slice(bytes).map_err(|e| {
        let mut err = ParseError::new(format!("Malformed schedule file: {e}"));
        err.line = Some(e.line()).filter(|l| *l > 0);
        err.column = Some(e.column()).filter(|c| *c > 0);
        err
    })?;

    if records.len() > options.max_records {
        return Err(ParseError::new(format!(
            "A maximum of {} schedules can be imported at one time, file has {}",
            options.max_records,
            records.len()
        )));
    }

    let lines = record_start_lines(bytes);
    let mut schedules = Vec::with_capacity(records.len());

    for (idx, value) in records.into_iter().enumerate() {
        let record = idx + 1;
        let line = lines.get(idx).copied();

        let mut draft: ScheduleDraft = serde_json::from_value(value)
            .map_err(|e| ParseError::new(format!("Invalid schedule: {e}")).in_record(record, line))?;

        let site_missing = draft
            .energy_site_id
            .as_deref()
            .map_or(true, |s| s.trim().is_empty());
        if site_missing {
            draft.energy_site_id = options.default_site_id.clone();
        }

        let name = draft.name.clone().unwrap_or_default();
        let validated = match &options.known_site_ids {
            Some(known) => draft.into_schedule_for(known, Uuid::new_v4(), now),
            None => draft.into_schedule(Uuid::new_v4(), now),
        };
        let validated = validated.map_err(|issues| {
            let mut err = ParseError::new(format!("Schedule '{name}' is invalid")).in_record(record, line);
            err.issues = issues;
            err
        })?;
        schedules.push(validated.schedule);
    }

    Ok(schedules)
}

/// Pretty-printed JSON array, one object per schedule group, in input order
pub fn serialize(schedules: &[Schedule]) -> serde_json::Result<Vec<u8>> {
    let drafts: Vec<ScheduleDraft> = schedules.iter().map(ScheduleDraft::from).collect();
    serde_json::to_vec_pretty(&drafts)
}

/// 1-based line on which each top-level array element starts
fn record_start_lines(bytes: &[u8]) -> Vec<usize> {
    let mut lines = Vec::new();
    let mut line = 1;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut expecting_element = false;

    for &b in bytes {
        if b == b'\n' {
            line += 1;
        }
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        if depth == 1 && expecting_element && b != b']' {
            lines.push(line);
            expecting_element = false;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth == 1 {
                    expecting_element = true;
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 1 => expecting_element = true,
            _ => {}
        }
    }
    lines
}
