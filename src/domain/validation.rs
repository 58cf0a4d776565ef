//! Schedule validation
//!
//! Two layers: [`validate`] checks the invariants of a typed [`Schedule`], and
//! [`ScheduleDraft`] carries the loosely typed shape received over the API or
//! read from an import file, resolving strings and optional fields into a
//! typed schedule while collecting every field error it finds.

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::schedule::hhmm;
use super::{DayOfWeek, ReconciliationMode, Schedule, ScheduleType};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_PERCENT: u8 = 100;

/// One problem with one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating a schedule. Warnings never block acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid {
        warnings: Vec<FieldIssue>,
    },
    Invalid {
        errors: Vec<FieldIssue>,
        warnings: Vec<FieldIssue>,
    },
}

impl ValidationResult {
    fn from_parts(errors: Vec<FieldIssue>, warnings: Vec<FieldIssue>) -> Self {
        if errors.is_empty() {
            Self::Valid { warnings }
        } else {
            Self::Invalid { errors, warnings }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn errors(&self) -> &[FieldIssue] {
        match self {
            Self::Valid { .. } => &[],
            Self::Invalid { errors, .. } => errors,
        }
    }

    pub fn warnings(&self) -> &[FieldIssue] {
        match self {
            Self::Valid { warnings } | Self::Invalid { warnings, .. } => warnings,
        }
    }
}

/// Check a typed schedule's invariants.
pub fn validate(schedule: &Schedule) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if schedule.days_of_week.is_empty() {
        errors.push(FieldIssue::new(
            "daysOfWeek",
            "At least one day of the week must be selected.",
        ));
    }
    // A zero-length window is ambiguous (empty or all day), so it is rejected
    if schedule.start_time == schedule.end_time {
        errors.push(FieldIssue::new(
            "endTime",
            "Start and end time must differ.",
        ));
    }
    check_percent(
        &mut errors,
        "onPeakBackupPercent",
        schedule.permanent_on_peak_backup_percent,
    );
    check_percent(
        &mut errors,
        "offPeakBackupPercent",
        schedule.permanent_off_peak_backup_percent,
    );
    if let Some(factor) = schedule.weather_scaling_factor {
        check_percent(&mut errors, "weatherScalingFactor", factor);
    }
    if schedule.energy_site_id.trim().is_empty() {
        errors.push(FieldIssue::new("energySiteId", "Energy site is required."));
    }
    if schedule.name.trim().is_empty() {
        errors.push(FieldIssue::new("name", "Schedule name cannot be blank."));
    } else if schedule.name.chars().count() > MAX_NAME_LEN {
        errors.push(FieldIssue::new(
            "name",
            format!("Schedule name cannot exceed {MAX_NAME_LEN} characters."),
        ));
    }
    if let Some(description) = &schedule.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(FieldIssue::new(
                "description",
                format!("Description cannot exceed {MAX_DESCRIPTION_LEN} characters."),
            ));
        }
    }

    if schedule.permanent_on_peak_backup_percent >= schedule.permanent_off_peak_backup_percent {
        warnings.push(FieldIssue::new(
            "onPeakBackupPercent",
            format!(
                "On-peak reserve ({}%) is not below off-peak reserve ({}%); the battery may not charge off-peak.",
                schedule.permanent_on_peak_backup_percent, schedule.permanent_off_peak_backup_percent
            ),
        ));
    }

    ValidationResult::from_parts(errors, warnings)
}

fn check_percent(errors: &mut Vec<FieldIssue>, field: &str, value: u8) {
    if value > MAX_PERCENT {
        errors.push(FieldIssue::new(
            field,
            format!("Must be between 0 and {MAX_PERCENT}, got {value}."),
        ));
    }
}

// ============================================================================
// Boundary shape
// ============================================================================

/// A day given by name (`MONDAY`, `monday`, `Mon`) or ISO number (`1` = Monday)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayToken {
    Number(i64),
    Name(String),
}

impl DayToken {
    pub fn resolve(&self) -> Option<DayOfWeek> {
        match self {
            Self::Number(n) => u8::try_from(*n).ok().and_then(DayOfWeek::from_number),
            Self::Name(name) => {
                let name = name.trim();
                DayOfWeek::from_str(name)
                    .ok()
                    .or_else(|| Weekday::from_str(name).ok().map(DayOfWeek::from))
                    .or_else(|| name.parse::<u8>().ok().and_then(DayOfWeek::from_number))
            }
        }
    }
}

impl From<DayOfWeek> for DayToken {
    fn from(day: DayOfWeek) -> Self {
        Self::Name(day.to_string())
    }
}

/// Loosely typed schedule as received from a client or an import file.
///
/// Unknown fields are ignored. Missing optional fields take their defaults
/// here, at the boundary, so the core only sees fully typed schedules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_group_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_site_id: Option<String>,
    #[validate(length(max = 100, message = "Schedule name cannot exceed 100 characters."))]
    #[serde(default)]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "Description cannot exceed 255 characters."))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub days_of_week: Option<Vec<DayToken>>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Must be between 0 and 100."))]
    #[serde(default, alias = "permanentOnPeakBackupPercent")]
    pub on_peak_backup_percent: Option<i64>,
    #[validate(range(min = 0, max = 100, message = "Must be between 0 and 100."))]
    #[serde(default, alias = "permanentOffPeakBackupPercent")]
    pub off_peak_backup_percent: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Must be between 0 and 100."))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_scaling_factor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_mode: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A draft that resolved into a valid schedule, with any soft warnings
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub schedule: Schedule,
    pub warnings: Vec<FieldIssue>,
}

impl ScheduleDraft {
    /// Resolve into a typed schedule.
    ///
    /// `fallback_group_id` and `now` fill `scheduleGroupId` and `updatedAt`
    /// when the draft does not carry them. Returns every field error found.
    pub fn into_schedule(
        self,
        fallback_group_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Validated, Vec<FieldIssue>> {
        let mut errors = self
            .validate()
            .err()
            .map(|e| field_issues_from(&e))
            .unwrap_or_default();

        let name = self.name.unwrap_or_default();
        let energy_site_id = self.energy_site_id.unwrap_or_default();

        let mut days = BTreeSet::new();
        match self.days_of_week {
            None => push_unique(&mut errors, "daysOfWeek", "Days of week are required."),
            Some(tokens) => {
                for token in tokens {
                    match token.resolve() {
                        Some(day) => {
                            days.insert(day);
                        }
                        None => push_unique(
                            &mut errors,
                            "daysOfWeek",
                            format!("Unrecognised day of week {token:?}."),
                        ),
                    }
                }
            }
        }
        // reported even when other fields stop the typed schedule from forming
        if days.is_empty() {
            push_unique(&mut errors, "daysOfWeek", "At least one day of the week must be selected.");
        }
        if name.trim().is_empty() {
            push_unique(&mut errors, "name", "Schedule name cannot be blank.");
        }

        let start_time = parse_time(&mut errors, "startTime", self.start_time.as_deref());
        let end_time = parse_time(&mut errors, "endTime", self.end_time.as_deref());

        let time_zone = match self.time_zone.as_deref().map(str::trim) {
            None | Some("") => {
                push_unique(&mut errors, "timeZone", "Time zone is required.");
                None
            }
            Some(zone) => match zone.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    push_unique(&mut errors, "timeZone", format!("Unknown time zone '{zone}'."));
                    None
                }
            },
        };

        let on_peak = parse_percent(&mut errors, "onPeakBackupPercent", self.on_peak_backup_percent);
        let off_peak =
            parse_percent(&mut errors, "offPeakBackupPercent", self.off_peak_backup_percent);
        let weather_scaling_factor = match self.weather_scaling_factor {
            None => None,
            Some(v) => u8::try_from(v).ok().filter(|v| *v <= MAX_PERCENT).or_else(|| {
                push_unique(&mut errors, "weatherScalingFactor", "Must be between 0 and 100.");
                None
            }),
        };

        let schedule_type = parse_enum::<ScheduleType>(
            &mut errors,
            "scheduleType",
            self.schedule_type.as_deref(),
        );
        let reconciliation_mode = parse_enum::<ReconciliationMode>(
            &mut errors,
            "reconciliationMode",
            self.reconciliation_mode.as_deref(),
        );

        let (Some(start_time), Some(end_time), Some(time_zone), Some(on_peak), Some(off_peak)) =
            (start_time, end_time, time_zone, on_peak, off_peak)
        else {
            return Err(errors);
        };

        let schedule = Schedule {
            schedule_group_id: self.schedule_group_id.unwrap_or(fallback_group_id),
            energy_site_id,
            name,
            description: self.description,
            days_of_week: days,
            start_time,
            end_time,
            time_zone,
            permanent_on_peak_backup_percent: on_peak,
            permanent_off_peak_backup_percent: off_peak,
            schedule_type: schedule_type.unwrap_or_default(),
            weather_scaling_factor,
            reconciliation_mode: reconciliation_mode.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            updated_at: self.updated_at.unwrap_or(now),
        };

        let (semantic_errors, warnings) = match validate(&schedule) {
            ValidationResult::Valid { warnings } => (Vec::new(), warnings),
            ValidationResult::Invalid { errors, warnings } => (errors, warnings),
        };
        for issue in semantic_errors {
            push_unique(&mut errors, &issue.field, issue.message);
        }

        if errors.is_empty() {
            Ok(Validated { schedule, warnings })
        } else {
            Err(errors)
        }
    }

    /// Like [`into_schedule`](Self::into_schedule), but also rejects an
    /// `energySiteId` that is not one of `known_sites`
    pub fn into_schedule_for(
        self,
        known_sites: &[String],
        fallback_group_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Validated, Vec<FieldIssue>> {
        let unknown = self
            .energy_site_id
            .as_deref()
            .filter(|s| !s.trim().is_empty() && !known_sites.iter().any(|k| k == s))
            .map(|s| FieldIssue::new("energySiteId", format!("Unknown energy site '{s}'.")));

        match (self.into_schedule(fallback_group_id, now), unknown) {
            (result, None) => result,
            (Ok(_), Some(issue)) => Err(vec![issue]),
            (Err(mut errors), Some(issue)) => {
                push_unique(&mut errors, &issue.field, issue.message);
                Err(errors)
            }
        }
    }
}

impl From<&Schedule> for ScheduleDraft {
    fn from(s: &Schedule) -> Self {
        Self {
            schedule_group_id: Some(s.schedule_group_id),
            energy_site_id: Some(s.energy_site_id.clone()),
            name: Some(s.name.clone()),
            description: s.description.clone(),
            days_of_week: Some(s.days_of_week.iter().copied().map(DayToken::from).collect()),
            start_time: Some(hhmm::format(&s.start_time)),
            end_time: Some(hhmm::format(&s.end_time)),
            time_zone: Some(s.time_zone.name().to_string()),
            on_peak_backup_percent: Some(s.permanent_on_peak_backup_percent.into()),
            off_peak_backup_percent: Some(s.permanent_off_peak_backup_percent.into()),
            schedule_type: Some(s.schedule_type.to_string()),
            weather_scaling_factor: s.weather_scaling_factor.map(i64::from),
            reconciliation_mode: Some(s.reconciliation_mode.to_string()),
            enabled: Some(s.enabled),
            updated_at: Some(s.updated_at),
        }
    }
}

/// Only the first problem per field is reported
fn push_unique(errors: &mut Vec<FieldIssue>, field: &str, message: impl Into<String>) {
    if !errors.iter().any(|e| e.field == field) {
        errors.push(FieldIssue::new(field, message));
    }
}

fn parse_time(
    errors: &mut Vec<FieldIssue>,
    field: &str,
    raw: Option<&str>,
) -> Option<chrono::NaiveTime> {
    match raw {
        None => {
            push_unique(errors, field, "Time is required.");
            None
        }
        Some(raw) => hhmm::parse(raw).or_else(|| {
            push_unique(errors, field, format!("Invalid time '{raw}', expected HH:MM."));
            None
        }),
    }
}

fn parse_percent(errors: &mut Vec<FieldIssue>, field: &str, raw: Option<i64>) -> Option<u8> {
    match raw {
        None => {
            push_unique(errors, field, "Backup percent is required.");
            None
        }
        Some(v) => u8::try_from(v).ok().filter(|v| *v <= MAX_PERCENT).or_else(|| {
            push_unique(errors, field, "Must be between 0 and 100.");
            None
        }),
    }
}

fn parse_enum<T: FromStr>(errors: &mut Vec<FieldIssue>, field: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw?.trim();
    match T::from_str(raw) {
        Ok(v) => Some(v),
        Err(_) => {
            push_unique(errors, field, format!("Unknown value '{raw}'."));
            None
        }
    }
}

fn field_issues_from(errors: &validator::ValidationErrors) -> Vec<FieldIssue> {
    let mut issues: Vec<FieldIssue> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = camel_case(&field.to_string());
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                FieldIssue::new(field.clone(), message)
            })
        })
        .collect();
    // field_errors() is a HashMap; keep reports stable
    issues.sort_by(|a, b| a.field.cmp(&b.field));
    issues
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
