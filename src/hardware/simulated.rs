use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{BackupReserveTarget, DeviceControl, DeviceError, TelemetrySource};
use crate::power_flow::PowerSnapshot;

#[derive(Debug, Clone)]
struct SimulatedSite {
    target: Option<BackupReserveTarget>,
    snapshot: PowerSnapshot,
    offline: bool,
    commands: Vec<BackupReserveTarget>,
}

/// In-memory stand-in for site gateways.
///
/// Remembers the last applied setpoints per site and serves a settable
/// power snapshot. Sites can be taken offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct SimulatedSites {
    sites: RwLock<HashMap<String, SimulatedSite>>,
}

impl SimulatedSites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Midday reading: 3 kW solar, 1 kW house, 500 W into the battery,
    /// remainder exported
    pub fn default_snapshot() -> PowerSnapshot {
        PowerSnapshot::new(3000.0, -1500.0, 1000.0, -500.0).with_percentage_charged(64.0)
    }

    pub async fn add_site(&self, site_id: impl Into<String>) {
        self.add_site_with(site_id, Self::default_snapshot()).await;
    }

    pub async fn add_site_with(&self, site_id: impl Into<String>, snapshot: PowerSnapshot) {
        let site_id = site_id.into();
        info!(site_id = %site_id, "Registering simulated energy site");
        self.sites.write().await.insert(
            site_id,
            SimulatedSite {
                target: None,
                snapshot,
                offline: false,
                commands: Vec::new(),
            },
        );
    }

    pub async fn set_snapshot(&self, site_id: &str, snapshot: PowerSnapshot) -> Result<(), DeviceError> {
        let mut sites = self.sites.write().await;
        let site = sites
            .get_mut(site_id)
            .ok_or_else(|| DeviceError::UnknownSite(site_id.to_string()))?;
        site.snapshot = snapshot;
        Ok(())
    }

    /// Overwrites the device's setpoints without recording a command,
    /// like a change made from the vendor app
    pub async fn force_target(&self, site_id: &str, target: BackupReserveTarget) -> Result<(), DeviceError> {
        let mut sites = self.sites.write().await;
        let site = sites
            .get_mut(site_id)
            .ok_or_else(|| DeviceError::UnknownSite(site_id.to_string()))?;
        site.target = Some(target);
        Ok(())
    }

    pub async fn set_offline(&self, site_id: &str, offline: bool) -> Result<(), DeviceError> {
        let mut sites = self.sites.write().await;
        let site = sites
            .get_mut(site_id)
            .ok_or_else(|| DeviceError::UnknownSite(site_id.to_string()))?;
        site.offline = offline;
        Ok(())
    }

    /// Commands applied to a site so far, oldest first
    pub async fn commands(&self, site_id: &str) -> Vec<BackupReserveTarget> {
        self.sites
            .read()
            .await
            .get(site_id)
            .map(|s| s.commands.clone())
            .unwrap_or_default()
    }

    async fn with_online_site<T>(
        &self,
        site_id: &str,
        f: impl FnOnce(&SimulatedSite) -> T,
    ) -> Result<T, DeviceError> {
        let sites = self.sites.read().await;
        let site = sites
            .get(site_id)
            .ok_or_else(|| DeviceError::UnknownSite(site_id.to_string()))?;
        if site.offline {
            return Err(DeviceError::Communication(format!("site {site_id} is offline")));
        }
        Ok(f(site))
    }
}

#[async_trait]
impl DeviceControl for SimulatedSites {
    async fn current_target(&self, site_id: &str) -> Result<Option<BackupReserveTarget>, DeviceError> {
        self.with_online_site(site_id, |s| s.target).await
    }

    async fn apply_target(&self, site_id: &str, target: BackupReserveTarget) -> Result<(), DeviceError> {
        for pct in [target.on_peak_backup_percent, target.off_peak_backup_percent] {
            if pct > 100 {
                return Err(DeviceError::Rejected(format!("backup reserve {pct}% out of range")));
            }
        }

        let mut sites = self.sites.write().await;
        let site = sites
            .get_mut(site_id)
            .ok_or_else(|| DeviceError::UnknownSite(site_id.to_string()))?;
        if site.offline {
            return Err(DeviceError::Communication(format!("site {site_id} is offline")));
        }

        debug!(
            site_id,
            on_peak = target.on_peak_backup_percent,
            off_peak = target.off_peak_backup_percent,
            "Simulated gateway accepted backup reserve"
        );
        site.target = Some(target);
        site.commands.push(target);
        Ok(())
    }
}

#[async_trait]
impl TelemetrySource for SimulatedSites {
    async fn live_snapshot(&self, site_id: &str) -> Result<PowerSnapshot, DeviceError> {
        self.with_online_site(site_id, |s| s.snapshot.with_timestamp(Utc::now()))
            .await
    }
}
