use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{DayOfWeek, ReconciliationMode, ScheduleType};

/// A backup-reserve schedule group.
///
/// One logical schedule applies to a set of weekdays; storage layers may still
/// project one row per day, but the group is the unit of edit, toggle and delete.
/// Percents stored here are the user-configured baseline. Weather-adjusted
/// values are derived at evaluation time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub schedule_group_id: Uuid,
    pub energy_site_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub days_of_week: BTreeSet<DayOfWeek>,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub time_zone: Tz,
    pub permanent_on_peak_backup_percent: u8,
    pub permanent_off_peak_backup_percent: u8,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub weather_scaling_factor: Option<u8>,
    #[serde(default)]
    pub reconciliation_mode: ReconciliationMode,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    /// Whether `now`, read in the schedule's own zone, falls on one of its days
    /// and inside its window.
    ///
    /// For a window crossing midnight the early-morning part belongs to the
    /// previous day: a Friday-only 22:00-06:00 schedule is active Saturday 02:00.
    pub fn is_active_at<T: TimeZone>(&self, now: &DateTime<T>) -> bool {
        let local = now.with_timezone(&self.time_zone);
        let today = DayOfWeek::from(local.weekday());
        let time = local.time();
        let window = self.window();

        if !window.wraps_midnight() {
            return self.days_of_week.contains(&today) && window.contains(time);
        }

        (time >= window.start && self.days_of_week.contains(&today))
            || (time < window.end && self.days_of_week.contains(&today.pred()))
    }

    pub fn is_weather_aware(&self) -> bool {
        self.schedule_type == ScheduleType::WeatherAware
    }

    /// Same functional content: days, window, zone, percents and mode.
    /// Names, ids and enablement are not compared.
    pub fn same_content(&self, other: &Schedule) -> bool {
        self.days_of_week == other.days_of_week
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.time_zone == other.time_zone
            && self.permanent_on_peak_backup_percent == other.permanent_on_peak_backup_percent
            && self.permanent_off_peak_backup_percent == other.permanent_off_peak_backup_percent
            && self.reconciliation_mode == other.reconciliation_mode
    }
}

/// Local time-of-day window `[start, end)`; `end <= start` wraps past midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.wraps_midnight() {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }
}

/// `HH:MM` time-of-day serialization, seconds kept only when non-zero
pub mod hhmm {
    use chrono::{NaiveTime, Timelike};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn format(t: &NaiveTime) -> String {
        if t.second() == 0 {
            t.format("%H:%M").to_string()
        } else {
            t.format("%H:%M:%S").to_string()
        }
    }

    pub fn parse(s: &str) -> Option<NaiveTime> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(t: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid time of day '{raw}'")))
    }
}
