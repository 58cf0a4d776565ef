//! Picks the schedule that governs a site right now.
//!
//! Pure: all I/O (loading schedules, fetching the forecast, talking to the
//! device) happens in the caller.

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{validate, ReconciliationMode, Schedule};
use crate::weather::EffectivePercents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    #[serde(rename_all = "camelCase")]
    Enforce {
        schedule_group_id: Uuid,
        on_peak_percent: u8,
        off_peak_percent: u8,
        overridden_by_weather: bool,
        mode: ReconciliationMode,
    },
    /// Leave the device as it is
    NoActiveSchedule,
}

impl Decision {
    pub fn schedule_group_id(&self) -> Option<Uuid> {
        match self {
            Decision::Enforce {
                schedule_group_id, ..
            } => Some(*schedule_group_id),
            Decision::NoActiveSchedule => None,
        }
    }
}

/// Enabled, valid schedules active at `now`, best candidate first.
///
/// Order is total: most recently updated wins, equal timestamps fall back to
/// the smallest `scheduleGroupId` (byte order, which is also the order of the
/// canonical hyphenated strings).
pub fn active_candidates<'a, T: TimeZone>(
    now: &DateTime<T>,
    candidates: &'a [Schedule],
) -> Vec<&'a Schedule> {
    let mut active: Vec<&Schedule> = candidates
        .iter()
        .filter(|s| s.enabled)
        .filter(|s| {
            let result = validate(s);
            if !result.is_valid() {
                warn!(
                    schedule_group_id = %s.schedule_group_id,
                    errors = ?result.errors(),
                    "Skipping invalid schedule during reconciliation"
                );
            }
            result.is_valid()
        })
        .filter(|s| s.is_active_at(now))
        .collect();

    active.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.schedule_group_id.cmp(&b.schedule_group_id))
    });
    active
}

/// `sunshine_percent` is the caller's forecast for the site, `None` when
/// unavailable.
pub fn resolve<T: TimeZone>(
    now: &DateTime<T>,
    candidates: &[Schedule],
    sunshine_percent: Option<u8>,
) -> Decision {
    let Some(winner) = active_candidates(now, candidates).into_iter().next() else {
        return Decision::NoActiveSchedule;
    };

    let effective = EffectivePercents::evaluate(winner, sunshine_percent);
    Decision::Enforce {
        schedule_group_id: winner.schedule_group_id,
        on_peak_percent: effective.on_peak_backup_percent,
        off_peak_percent: effective.off_peak_backup_percent,
        overridden_by_weather: effective.overridden_by_weather,
        mode: winner.reconciliation_mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::fixtures::{schedule, time};
    use crate::domain::{DayOfWeek, ScheduleType};
    use chrono::{Duration, Utc};
    use chrono_tz::Asia::Tokyo;
    use std::collections::BTreeSet;

    fn evening_utc() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2025, 3, 12, 18, 0, 0).unwrap()
    }

    fn enforced_group(decision: Decision) -> Uuid {
        decision.schedule_group_id().expect("expected an enforce decision")
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(resolve(&evening_utc(), &[], Some(100)), Decision::NoActiveSchedule);
    }

    #[test]
    fn test_single_active_schedule() {
        let s = schedule("evening");
        let decision = resolve(&evening_utc(), std::slice::from_ref(&s), None);
        assert_eq!(
            decision,
            Decision::Enforce {
                schedule_group_id: s.schedule_group_id,
                on_peak_percent: 20,
                off_peak_percent: 80,
                overridden_by_weather: false,
                mode: ReconciliationMode::Continuous,
            }
        );
    }

    #[test]
    fn test_disabled_and_out_of_window_are_ignored() {
        let mut disabled = schedule("disabled");
        disabled.enabled = false;
        let mut morning = schedule("morning");
        morning.start_time = time(6, 0);
        morning.end_time = time(9, 0);
        let mut weekend = schedule("weekend");
        weekend.days_of_week = BTreeSet::from([DayOfWeek::Saturday, DayOfWeek::Sunday]);

        assert_eq!(
            resolve(&evening_utc(), &[disabled, morning, weekend], None),
            Decision::NoActiveSchedule
        );
    }

    #[test]
    fn test_latest_update_wins() {
        let older = schedule("older");
        let mut newer = schedule("newer");
        newer.updated_at = older.updated_at + Duration::minutes(5);

        let decision = resolve(&evening_utc(), &[older, newer.clone()], None);
        assert_eq!(enforced_group(decision), newer.schedule_group_id);
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        let mut a = schedule("a");
        let mut b = schedule("b");
        a.schedule_group_id = Uuid::parse_str("00000000-0000-4000-8000-00000000000a").unwrap();
        b.schedule_group_id = Uuid::parse_str("00000000-0000-4000-8000-00000000000b").unwrap();

        for _ in 0..10 {
            let forward = resolve(&evening_utc(), &[a.clone(), b.clone()], None);
            let backward = resolve(&evening_utc(), &[b.clone(), a.clone()], None);
            assert_eq!(enforced_group(forward), a.schedule_group_id);
            assert_eq!(forward, backward);
        }
    }

    #[test]
    fn test_invalid_schedule_is_skipped_not_fatal() {
        let mut broken = schedule("broken");
        broken.permanent_off_peak_backup_percent = 150;
        broken.updated_at = broken.updated_at + Duration::days(1);
        let good = schedule("good");

        let decision = resolve(&evening_utc(), &[broken, good.clone()], None);
        assert_eq!(enforced_group(decision), good.schedule_group_id);
    }

    #[test]
    fn test_weather_adjusts_off_peak_only() {
        let mut s = schedule("cloudy");
        s.schedule_type = ScheduleType::WeatherAware;
        s.permanent_off_peak_backup_percent = 85;
        s.weather_scaling_factor = Some(100);

        match resolve(&evening_utc(), &[s], Some(0)) {
            Decision::Enforce {
                on_peak_percent,
                off_peak_percent,
                overridden_by_weather,
                ..
            } => {
                assert_eq!(on_peak_percent, 20);
                assert_eq!(off_peak_percent, 90);
                assert!(overridden_by_weather);
            }
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn test_local_weekday_of_schedule_zone() {
        // Wednesday 18:00 UTC is Thursday 03:00 in Tokyo
        let mut s = schedule("tokyo night");
        s.time_zone = Tokyo;
        s.days_of_week = BTreeSet::from([DayOfWeek::Thursday]);
        s.start_time = time(1, 0);
        s.end_time = time(5, 0);

        assert!(resolve(&evening_utc(), std::slice::from_ref(&s), None)
            .schedule_group_id()
            .is_some());
    }

    #[test]
    fn test_mode_is_carried_not_filtered() {
        let mut s = schedule("boot");
        s.reconciliation_mode = ReconciliationMode::StartupOnly;
        match resolve(&evening_utc(), &[s], None) {
            Decision::Enforce { mode, .. } => assert_eq!(mode, ReconciliationMode::StartupOnly),
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(Decision::NoActiveSchedule).unwrap();
        assert_eq!(json["decision"], "NO_ACTIVE_SCHEDULE");

        let s = schedule("evening");
        let json = serde_json::to_value(resolve(&evening_utc(), &[s], None)).unwrap();
        assert_eq!(json["decision"], "ENFORCE");
        assert_eq!(json["offPeakPercent"], 80);
        assert_eq!(json["mode"], "CONTINUOUS");
    }
}
