use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed imbalance between sources and sinks before a snapshot counts as inconsistent (W)
const BALANCE_TOLERANCE_W: f64 = 100.0;

/// Instantaneous power readings for one energy site
///
/// Power balance equation: Solar + Battery discharge + Grid import = Load + Battery charge + Grid export
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    /// Solar production in watts (never negative)
    pub solar_power: f64,

    /// Grid power in watts (positive = import, negative = export)
    pub grid_power: f64,

    /// Home consumption in watts (never negative)
    pub load_power: f64,

    /// Battery power in watts (positive = discharging, negative = charging)
    pub battery_power: f64,

    /// Battery state of charge as reported by the site, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_charged: Option<f64>,

    /// When the readings were captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PowerSnapshot {
    pub fn new(solar_power: f64, grid_power: f64, load_power: f64, battery_power: f64) -> Self {
        Self {
            solar_power,
            grid_power,
            load_power,
            battery_power,
            percentage_charged: None,
            timestamp: None,
        }
    }

    pub fn with_percentage_charged(mut self, percent: f64) -> Self {
        self.percentage_charged = Some(percent);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Verify power balance holds (sources = sinks)
    pub fn verify_power_balance(&self) -> bool {
        let sources = self.solar_power + self.grid_import_w() + self.battery_discharge_w();
        let sinks = self.load_power + self.grid_export_w() + self.battery_charge_w();
        (sources - sinks).abs() < BALANCE_TOLERANCE_W
    }

    /// Grid import (0 if exporting)
    pub fn grid_import_w(&self) -> f64 {
        self.grid_power.max(0.0)
    }

    /// Grid export (0 if importing)
    pub fn grid_export_w(&self) -> f64 {
        (-self.grid_power).max(0.0)
    }

    pub fn battery_discharge_w(&self) -> f64 {
        self.battery_power.max(0.0)
    }

    pub fn battery_charge_w(&self) -> f64 {
        (-self.battery_power).max(0.0)
    }

    /// Solar used on site rather than exported
    pub fn self_consumption_w(&self) -> f64 {
        let consumed = self.solar_power - self.grid_export_w();
        consumed.max(0.0).min(self.solar_power.max(0.0))
    }

    /// Share of home load covered without the grid (0-1)
    pub fn self_sufficiency_ratio(&self) -> f64 {
        // Loads under 10 W are noise from the meter, not consumption
        const MIN_LOAD_THRESHOLD_W: f64 = 10.0;
        if self.load_power < MIN_LOAD_THRESHOLD_W {
            return 0.0;
        }
        let from_grid = self.grid_import_w().min(self.load_power);
        ((self.load_power - from_grid) / self.load_power).clamp(0.0, 1.0)
    }
}

impl fmt::Display for PowerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PowerSnapshot {{ Solar: {:.0}W, Load: {:.0}W, Battery: {:.0}W, Grid: {:.0}W, Balanced: {} }}",
            self.solar_power,
            self.load_power,
            self.battery_power,
            self.grid_power,
            if self.verify_power_balance() { "✓" } else { "✗" }
        )
    }
}
