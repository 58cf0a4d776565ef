use chrono::Weekday;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

// ============================================================================
// Calendar
// ============================================================================

/// Day of the week a schedule applies to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// ISO-8601 day number, Monday = 1
    pub fn number(self) -> u8 {
        Weekday::from(self).number_from_monday() as u8
    }

    /// Inverse of [`DayOfWeek::number`]
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Monday),
            2 => Some(Self::Tuesday),
            3 => Some(Self::Wednesday),
            4 => Some(Self::Thursday),
            5 => Some(Self::Friday),
            6 => Some(Self::Saturday),
            7 => Some(Self::Sunday),
            _ => None,
        }
    }

    pub fn pred(self) -> Self {
        Weekday::from(self).pred().into()
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

// ============================================================================
// Schedule classification
// ============================================================================

/// Whether a schedule reacts to the solar forecast
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ScheduleType {
    #[default]
    Basic,
    WeatherAware,
}

/// When the device-control side applies a schedule's decision
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ReconciliationMode {
    /// Re-enforced on every reconciliation tick, correcting drift
    #[default]
    Continuous,
    /// Enforced once per process start, then left alone
    StartupOnly,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_day_numbers_round_trip() {
        for day in DayOfWeek::iter() {
            assert_eq!(DayOfWeek::from_number(day.number()), Some(day));
        }
        assert_eq!(DayOfWeek::Monday.number(), 1);
        assert_eq!(DayOfWeek::Sunday.number(), 7);
        assert_eq!(DayOfWeek::from_number(0), None);
        assert_eq!(DayOfWeek::from_number(8), None);
    }

    #[test]
    fn test_pred_wraps_week() {
        assert_eq!(DayOfWeek::Monday.pred(), DayOfWeek::Sunday);
        assert_eq!(DayOfWeek::Thursday.pred(), DayOfWeek::Wednesday);
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!(DayOfWeek::from_str("friday").unwrap(), DayOfWeek::Friday);
        assert_eq!(
            ScheduleType::from_str("weather_aware").unwrap(),
            ScheduleType::WeatherAware
        );
        assert_eq!(
            ReconciliationMode::from_str("STARTUP_ONLY").unwrap(),
            ReconciliationMode::StartupOnly
        );
        assert!(ReconciliationMode::from_str("SOMETIMES").is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&ScheduleType::WeatherAware).unwrap(),
            "\"WEATHER_AWARE\""
        );
        assert_eq!(DayOfWeek::Saturday.to_string(), "SATURDAY");
    }
}
