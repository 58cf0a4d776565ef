//! Weather-aware reserve adjustment
//!
//! Forecast sources estimate sunshine per site; the adjustment raises a
//! weather-aware schedule's off-peak reserve when less sun is expected.

pub mod adjustment;
pub mod sunshine;

pub use adjustment::{
    compute_effective_percent, EffectivePercents, ScheduleStatus, DEFAULT_WEATHER_SCALING_FACTOR,
    WEATHER_TARGET_CAP_PERCENT,
};
pub use sunshine::{
    seasonal_window, Daylight, ForecastError, HourlyConditions, SiteConditions, SiteForecastStore,
    SolarForecast, SunshineForecaster,
};
