use serde::Serialize;

use crate::domain::Schedule;

/// Weather adjustment never raises the reserve target above this
pub const WEATHER_TARGET_CAP_PERCENT: u8 = 90;

/// Scaling applied to a weather-aware schedule that does not set one
pub const DEFAULT_WEATHER_SCALING_FACTOR: u8 = 100;

/// Off-peak percent a schedule should use given the sunshine forecast.
///
/// Returns the effective percent and whether it differs from the permanent
/// baseline. BASIC schedules always get their baseline back.
///
/// ```
/// use energy_schedule_controller::weather::compute_effective_percent;
/// # use energy_schedule_controller::domain::*;
/// # let mut schedule: Schedule = serde_json::from_value(serde_json::json!({
/// #     "scheduleGroupId": "6f2c1d38-5b7e-4a53-9a3a-0c1b0f4f6f1e",
/// #     "energySiteId": "site", "name": "winter", "daysOfWeek": ["MONDAY"],
/// #     "startTime": "16:00", "endTime": "21:00", "timeZone": "UTC",
/// #     "permanentOnPeakBackupPercent": 20, "permanentOffPeakBackupPercent": 85,
/// #     "scheduleType": "WEATHER_AWARE", "weatherScalingFactor": 100,
/// #     "enabled": true, "updatedAt": "2025-01-01T00:00:00Z"
/// # })).unwrap();
/// // 85% baseline, no sun at all: raw target would be 100%, capped at 90%
/// assert_eq!(compute_effective_percent(&schedule, 0), (90, true));
/// ```
pub fn compute_effective_percent(schedule: &Schedule, forecast_sunshine_percent: u8) -> (u8, bool) {
    let permanent = schedule.permanent_off_peak_backup_percent;
    if !schedule.is_weather_aware() {
        return (permanent, false);
    }

    let sunshine = f64::from(forecast_sunshine_percent.min(100));
    let shortfall = 100.0 - sunshine;
    let factor = f64::from(
        schedule
            .weather_scaling_factor
            .unwrap_or(DEFAULT_WEATHER_SCALING_FACTOR)
            .min(100),
    );
    let headroom = 100.0 - f64::from(permanent.min(100));
    let adjustment = (shortfall / 100.0) * headroom * (factor / 100.0);

    let raw = (f64::from(permanent) + adjustment).round() as u8;
    let target = raw.min(WEATHER_TARGET_CAP_PERCENT).max(permanent);

    (target, target != permanent)
}

/// On-peak and off-peak percents in force for a schedule at evaluation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePercents {
    pub on_peak_backup_percent: u8,
    pub off_peak_backup_percent: u8,
    pub overridden_by_weather: bool,
}

impl EffectivePercents {
    /// `None` means no forecast is available, so the baseline applies.
    /// On-peak is never weather-adjusted.
    pub fn evaluate(schedule: &Schedule, sunshine_percent: Option<u8>) -> Self {
        let (off_peak, overridden) = match sunshine_percent {
            Some(sunshine) => compute_effective_percent(schedule, sunshine),
            None => (schedule.permanent_off_peak_backup_percent, false),
        };
        Self {
            on_peak_backup_percent: schedule.permanent_on_peak_backup_percent,
            off_peak_backup_percent: off_peak,
            overridden_by_weather: overridden,
        }
    }
}

/// A schedule together with the percents derived for it right now
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatus {
    #[serde(flatten)]
    pub schedule: Schedule,
    #[serde(flatten)]
    pub effective: EffectivePercents,
}

impl ScheduleStatus {
    pub fn evaluate(schedule: Schedule, sunshine_percent: Option<u8>) -> Self {
        let effective = EffectivePercents::evaluate(&schedule, sunshine_percent);
        Self { schedule, effective }
    }
}
