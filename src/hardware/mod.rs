//! Energy-site device access
//!
//! The reconciler talks to a site's battery gateway only through
//! [`DeviceControl`]; live readings come through [`TelemetrySource`].

pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::power_flow::PowerSnapshot;

pub use simulated::SimulatedSites;

/// Device-side errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Unknown energy site: {0}")]
    UnknownSite(String),
    #[error("Communication error: {0}")]
    Communication(String),
    #[error("Device rejected command: {0}")]
    Rejected(String),
}

/// Backup-reserve setpoints as held by the site's gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReserveTarget {
    pub on_peak_backup_percent: u8,
    pub off_peak_backup_percent: u8,
    /// Schedule group that produced the setpoints, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_group_id: Option<Uuid>,
}

impl BackupReserveTarget {
    pub fn new(on_peak: u8, off_peak: u8) -> Self {
        Self {
            on_peak_backup_percent: on_peak,
            off_peak_backup_percent: off_peak,
            schedule_group_id: None,
        }
    }

    pub fn for_schedule(mut self, schedule_group_id: Uuid) -> Self {
        self.schedule_group_id = Some(schedule_group_id);
        self
    }

    /// Whether the device already holds these percents, whatever their origin
    pub fn same_setpoints(&self, other: &BackupReserveTarget) -> bool {
        self.on_peak_backup_percent == other.on_peak_backup_percent
            && self.off_peak_backup_percent == other.off_peak_backup_percent
    }
}

/// Battery backup-reserve control for a set of energy sites
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Setpoints currently held by the device, `None` if never set
    async fn current_target(&self, site_id: &str)
        -> Result<Option<BackupReserveTarget>, DeviceError>;

    async fn apply_target(
        &self,
        site_id: &str,
        target: BackupReserveTarget,
    ) -> Result<(), DeviceError>;
}

/// Instantaneous power readings for a site
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn live_snapshot(&self, site_id: &str) -> Result<PowerSnapshot, DeviceError>;
}
