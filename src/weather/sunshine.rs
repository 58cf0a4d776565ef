//! Solar forecast: how much sunshine a site can expect during today's
//! (or tomorrow's) generation window.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// Generation is negligible in the first and last hour of daylight
const DAYLIGHT_EDGE_HOURS: i64 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("no forecast data inside solar window {start} - {end}")]
    NoDataInWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("could not calculate {0} for solar window")]
    MissingMeasure(&'static str),
}

/// Sunshine expected during the solar window, 0-100
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarForecast {
    pub sunshine_percent: u8,
    pub reason: String,
}

impl SolarForecast {
    pub fn new(sunshine_percent: u8, reason: impl Into<String>) -> Self {
        Self {
            sunshine_percent: sunshine_percent.min(100),
            reason: reason.into(),
        }
    }
}

/// One hour of forecast conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyConditions {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub cloud_cover_percent: Option<f64>,
    #[serde(default)]
    pub precipitation_probability_percent: Option<f64>,
}

/// Sunrise and sunset for one local date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Daylight {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// Raw forecast data for one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConditions {
    pub time_zone: Tz,
    pub hours: Vec<HourlyConditions>,
    #[serde(default)]
    pub daylight: BTreeMap<NaiveDate, Daylight>,
}

/// Generation window used when sunrise/sunset are unknown, by season
pub fn seasonal_window(month: u32) -> (NaiveTime, NaiveTime) {
    let hm = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or(NaiveTime::MIN);
    match month {
        12 | 1 | 2 => (hm(9), hm(16)),
        6..=8 => (hm(7), hm(18)),
        _ => (hm(8), hm(17)),
    }
}

impl SiteConditions {
    /// Evaluates the solar window relevant at `now`.
    ///
    /// After today's sunset the window rolls over to tomorrow. Sunshine is the
    /// clear-sky share left by the average cloud cover, reduced by the worst
    /// precipitation chance in the window.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Result<SolarForecast, ForecastError> {
        let local_now = now.with_timezone(&self.time_zone);
        let mut date = local_now.date_naive();
        if let Some(today) = self.daylight.get(&date) {
            if now > today.sunset {
                debug!(%date, "past sunset, evaluating tomorrow");
                date = date.succ_opt().unwrap_or(date);
            }
        }

        let (start, end) = self.solar_window(date);

        let in_window: Vec<&HourlyConditions> = self
            .hours
            .iter()
            .filter(|h| h.start >= start && h.start < end)
            .collect();
        if in_window.is_empty() {
            return Err(ForecastError::NoDataInWindow { start, end });
        }

        let clouds: Vec<f64> = in_window
            .iter()
            .filter_map(|h| h.cloud_cover_percent)
            .collect();
        if clouds.is_empty() {
            return Err(ForecastError::MissingMeasure("average cloud cover"));
        }
        let avg_cloud = clouds.iter().sum::<f64>() / clouds.len() as f64;

        let max_precip = in_window
            .iter()
            .filter_map(|h| h.precipitation_probability_percent)
            .reduce(f64::max)
            .ok_or(ForecastError::MissingMeasure("max precipitation probability"))?;

        let sunshine = ((100.0 - avg_cloud) * (1.0 - max_precip / 100.0))
            .round()
            .clamp(0.0, 100.0) as u8;

        Ok(SolarForecast::new(
            sunshine,
            format!(
                "{sunshine}% sunshine expected {date}: avg cloud cover {avg_cloud:.0}%, max precipitation chance {max_precip:.0}%"
            ),
        ))
    }

    fn solar_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        if let Some(day) = self.daylight.get(&date) {
            let edge = Duration::hours(DAYLIGHT_EDGE_HOURS);
            let start = day.sunrise + edge;
            let end = day.sunset - edge;
            if start > end {
                warn!(%date, "solar window too short for edge offsets, using sunrise to sunset");
                return (day.sunrise, day.sunset);
            }
            return (start, end);
        }

        let (from, to) = seasonal_window(date.month());
        let local = |t: NaiveTime| {
            self.time_zone
                .from_local_datetime(&date.and_time(t))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(t)))
        };
        (local(from), local(to))
    }
}

/// Source of per-site sunshine forecasts
#[async_trait]
pub trait SunshineForecaster: Send + Sync {
    async fn forecast(&self, site_id: &str, now: DateTime<Utc>) -> anyhow::Result<SolarForecast>;
}

enum SiteForecast {
    Fixed(u8),
    Conditions(SiteConditions),
}

/// In-memory forecaster fed with fixed percents or raw hourly conditions.
/// Sites without data get the configured default.
pub struct SiteForecastStore {
    default_sunshine_percent: u8,
    sites: RwLock<HashMap<String, SiteForecast>>,
}

impl SiteForecastStore {
    pub fn new(default_sunshine_percent: u8) -> Self {
        Self {
            default_sunshine_percent: default_sunshine_percent.min(100),
            sites: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_fixed(&self, site_id: impl Into<String>, sunshine_percent: u8) {
        self.sites
            .write()
            .insert(site_id.into(), SiteForecast::Fixed(sunshine_percent.min(100)));
    }

    pub fn set_conditions(&self, site_id: impl Into<String>, conditions: SiteConditions) {
        self.sites
            .write()
            .insert(site_id.into(), SiteForecast::Conditions(conditions));
    }

    pub fn clear(&self, site_id: &str) {
        self.sites.write().remove(site_id);
    }
}

#[async_trait]
impl SunshineForecaster for SiteForecastStore {
    async fn forecast(&self, site_id: &str, now: DateTime<Utc>) -> anyhow::Result<SolarForecast> {
        let sites = self.sites.read();
        match sites.get(site_id) {
            Some(SiteForecast::Fixed(pct)) => {
                Ok(SolarForecast::new(*pct, format!("fixed forecast of {pct}% sunshine")))
            }
            Some(SiteForecast::Conditions(conditions)) => Ok(conditions.evaluate(now)?),
            None => Ok(SolarForecast::new(
                self.default_sunshine_percent,
                format!(
                    "no forecast for site {site_id}, assuming {}% sunshine",
                    self.default_sunshine_percent
                ),
            )),
        }
    }
}
