use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    api::error::ApiError,
    controller::AppState,
    power_flow::{self, FlowDecomposition, PowerSnapshot},
    weather::{SiteConditions, SolarForecast, SunshineForecaster},
};

/// Live snapshot together with where each watt is going
#[derive(Debug, Serialize)]
pub struct PowerFlowResponse {
    pub snapshot: PowerSnapshot,
    pub flows: FlowDecomposition,
    pub balanced: bool,
}

/// GET /api/energy/sites/:id/live_status
pub async fn live_status(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<Json<PowerSnapshot>, ApiError> {
    Ok(Json(state.telemetry.live_snapshot(&site_id).await?))
}

/// GET /api/energy/sites/:id/power_flow
pub async fn power_flow(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<Json<PowerFlowResponse>, ApiError> {
    let snapshot = state.telemetry.live_snapshot(&site_id).await?;
    let balanced = snapshot.verify_power_balance();
    if !balanced {
        tracing::debug!(%site_id, %snapshot, "Snapshot does not balance");
    }
    Ok(Json(PowerFlowResponse {
        flows: power_flow::compute(&snapshot),
        snapshot,
        balanced,
    }))
}

/// GET /api/energy/sites/:id/solar_forecast
pub async fn solar_forecast(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<Json<SolarForecast>, ApiError> {
    let forecast = state
        .forecasts
        .forecast(&site_id, Utc::now())
        .await
        .map_err(|e| ApiError::Forecast(e.to_string()))?;
    Ok(Json(forecast))
}

fn known_site(state: &AppState, site_id: &str) -> Result<(), ApiError> {
    if state.cfg.sites.iter().any(|s| s.id == site_id) {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("Energy site {site_id}")))
    }
}

/// PUT /api/energy/sites/:id/forecast - Replace the site's hourly conditions
pub async fn set_forecast(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Json(conditions): Json<SiteConditions>,
) -> Result<StatusCode, ApiError> {
    known_site(&state, &site_id)?;
    tracing::info!(%site_id, hours = conditions.hours.len(), "Forecast conditions updated");
    state.forecasts.set_conditions(site_id, conditions);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/energy/sites/:id/forecast - Fall back to the configured default
pub async fn clear_forecast(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    known_site(&state, &site_id)?;
    state.forecasts.clear(&site_id);
    Ok(StatusCode::NO_CONTENT)
}
