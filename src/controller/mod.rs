pub mod history;
pub mod reconciler;
pub mod service;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::hardware::{DeviceControl, SimulatedSites, TelemetrySource};
use crate::repo::Repositories;
use crate::weather::{SiteForecastStore, SunshineForecaster};

pub use history::{ExecutionHistory, ExecutionKind, ExecutionRecord, ExecutionStatus};
pub use reconciler::{active_candidates, resolve, Decision};
pub use service::{ReconciliationService, TaskStatus};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub repos: Arc<Repositories>,
    pub reconciler: Arc<ReconciliationService>,
    pub forecasts: Arc<SiteForecastStore>,
    pub telemetry: Arc<dyn TelemetrySource>,
}

impl AppState {
    /// Wires the service against simulated site gateways, one per
    /// configured site
    pub async fn new(cfg: Config) -> Result<Self> {
        let sites = Arc::new(SimulatedSites::new());
        let forecasts = Arc::new(SiteForecastStore::new(cfg.weather.default_sunshine_percent));

        for site in &cfg.sites {
            sites.add_site(site.id.clone()).await;
            if let Some(pct) = site.sunshine_percent {
                forecasts.set_fixed(site.id.clone(), pct);
            }
        }
        info!(sites = cfg.sites.len(), "Energy sites registered");

        Ok(Self::with_parts(cfg, sites.clone(), sites, forecasts))
    }

    pub fn with_parts(
        cfg: Config,
        devices: Arc<dyn DeviceControl>,
        telemetry: Arc<dyn TelemetrySource>,
        forecasts: Arc<SiteForecastStore>,
    ) -> Self {
        let repos = Arc::new(Repositories::new());
        let reconciler = Arc::new(ReconciliationService::new(
            repos.schedules.clone(),
            devices,
            forecasts.clone() as Arc<dyn SunshineForecaster>,
            Arc::new(ExecutionHistory::default()),
            cfg.site_ids(),
        ));

        Self {
            cfg,
            repos,
            reconciler,
            forecasts,
            telemetry,
        }
    }
}

pub fn spawn_controller_tasks(state: AppState, cfg: Config) {
    let reconciler = state.reconciler.clone();
    tokio::spawn(async move {
        reconciler
            .run(
                cfg.reconciliation.tick_seconds,
                cfg.reconciliation.run_on_startup,
            )
            .await;
    });
}
