use chrono::{DateTime, Utc};
use itertools::Itertools;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::history::{ExecutionHistory, ExecutionKind, ExecutionRecord, ExecutionStatus};
use super::reconciler::{resolve, Decision};
use crate::domain::{ReconciliationMode, Schedule};
use crate::hardware::{BackupReserveTarget, DeviceControl};
use crate::repo::ScheduleRepository;
use crate::weather::SunshineForecaster;

/// Task status tracking
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

/// Drives the reconciler against real collaborators.
///
/// At most one reconciliation runs per site at a time; different sites run
/// in parallel. STARTUP_ONLY schedules are enforced once per process.
pub struct ReconciliationService {
    schedules: Arc<ScheduleRepository>,
    devices: Arc<dyn DeviceControl>,
    forecaster: Arc<dyn SunshineForecaster>,
    history: Arc<ExecutionHistory>,
    configured_sites: Vec<String>,
    site_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    startup_enforced: Mutex<HashSet<Uuid>>,
    status: RwLock<TaskStatus>,
}

impl ReconciliationService {
    pub fn new(
        schedules: Arc<ScheduleRepository>,
        devices: Arc<dyn DeviceControl>,
        forecaster: Arc<dyn SunshineForecaster>,
        history: Arc<ExecutionHistory>,
        configured_sites: Vec<String>,
    ) -> Self {
        Self {
            schedules,
            devices,
            forecaster,
            history,
            configured_sites,
            site_locks: Mutex::new(HashMap::new()),
            startup_enforced: Mutex::new(HashSet::new()),
            status: RwLock::new(TaskStatus::default()),
        }
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub async fn status(&self) -> TaskStatus {
        self.status.read().await.clone()
    }

    /// Configured sites plus every site that has schedules
    pub fn site_ids(&self) -> Vec<String> {
        let mut ids: BTreeSet<String> = self.configured_sites.iter().cloned().collect();
        ids.extend(self.schedules.site_ids());
        ids.into_iter().collect()
    }

    /// Sunshine forecast for a site, `None` when the forecaster fails
    pub async fn sunshine_for(&self, site_id: &str, now: DateTime<Utc>) -> Option<u8> {
        match self.forecaster.forecast(site_id, now).await {
            Ok(forecast) => {
                debug!(site_id, sunshine = forecast.sunshine_percent, reason = %forecast.reason, "Solar forecast");
                Some(forecast.sunshine_percent)
            }
            Err(e) => {
                warn!(site_id, error = %e, "Solar forecast unavailable, using permanent reserve");
                None
            }
        }
    }

    fn site_lock(&self, site_id: &str) -> Arc<AsyncMutex<()>> {
        self.site_locks
            .lock()
            .entry(site_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Reconciles one site and records the outcome
    pub async fn reconcile_site(
        &self,
        site_id: &str,
        kind: ExecutionKind,
        now: DateTime<Utc>,
    ) -> ExecutionRecord {
        let lock = self.site_lock(site_id);
        let _guard = lock.lock().await;

        let schedules = self.schedules.list_for_site(site_id);
        let (group, status, details) = self.reconcile_locked(site_id, &schedules, now).await;

        let record = ExecutionRecord {
            site_id: site_id.to_string(),
            schedule_group_id: group,
            kind,
            status,
            details,
            at: now,
        };

        match record.status {
            ExecutionStatus::Failure => {
                error!(site_id, kind = %kind, details = %record.details, "Reconciliation failed")
            }
            ExecutionStatus::Success => {
                info!(site_id, kind = %kind, details = %record.details, "Reconciliation applied")
            }
            ExecutionStatus::Skipped => {
                debug!(site_id, kind = %kind, details = %record.details, "Reconciliation skipped")
            }
        }
        self.history.push(record.clone());
        record
    }

    async fn reconcile_locked(
        &self,
        site_id: &str,
        schedules: &[Schedule],
        now: DateTime<Utc>,
    ) -> (Option<Uuid>, ExecutionStatus, String) {
        let needs_forecast = schedules.iter().any(|s| s.enabled && s.is_weather_aware());
        let sunshine = if needs_forecast {
            self.sunshine_for(site_id, now).await
        } else {
            None
        };

        let Decision::Enforce {
            schedule_group_id,
            on_peak_percent,
            off_peak_percent,
            overridden_by_weather,
            mode,
        } = resolve(&now, schedules, sunshine)
        else {
            return (
                None,
                ExecutionStatus::Skipped,
                "No active schedule, device left untouched".to_string(),
            );
        };
        let group = Some(schedule_group_id);

        if mode == ReconciliationMode::StartupOnly
            && self.startup_enforced.lock().contains(&schedule_group_id)
        {
            return (
                group,
                ExecutionStatus::Skipped,
                "Startup-only schedule already enforced since start".to_string(),
            );
        }

        let target = BackupReserveTarget::new(on_peak_percent, off_peak_percent)
            .for_schedule(schedule_group_id);
        let weather_note = if overridden_by_weather {
            " (weather adjusted)"
        } else {
            ""
        };

        match self.devices.current_target(site_id).await {
            Ok(Some(current)) if current.same_setpoints(&target) => {
                self.mark_enforced(mode, schedule_group_id);
                return (
                    group,
                    ExecutionStatus::Skipped,
                    format!(
                        "Device already at {on_peak_percent}% on-peak / {off_peak_percent}% off-peak{weather_note}"
                    ),
                );
            }
            Ok(_) => {}
            Err(e) => {
                return (
                    group,
                    ExecutionStatus::Failure,
                    format!("Could not read device state: {e}"),
                );
            }
        }

        match self.devices.apply_target(site_id, target).await {
            Ok(()) => {
                self.mark_enforced(mode, schedule_group_id);
                (
                    group,
                    ExecutionStatus::Success,
                    format!(
                        "Set {on_peak_percent}% on-peak / {off_peak_percent}% off-peak{weather_note}"
                    ),
                )
            }
            Err(e) => (
                group,
                ExecutionStatus::Failure,
                format!("Device rejected backup reserve: {e}"),
            ),
        }
    }

    fn mark_enforced(&self, mode: ReconciliationMode, schedule_group_id: Uuid) {
        if mode == ReconciliationMode::StartupOnly {
            self.startup_enforced.lock().insert(schedule_group_id);
        }
    }

    /// Reconciles every known site concurrently
    pub async fn run_pass(self: &Arc<Self>, kind: ExecutionKind) -> Vec<ExecutionRecord> {
        let now = Utc::now();
        let mut tasks = JoinSet::new();
        for site_id in self.site_ids() {
            let service = Arc::clone(self);
            tasks.spawn(async move { service.reconcile_site(&site_id, kind, now).await });
        }

        let mut records = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(record) => records.push(record),
                Err(e) => error!(error = %e, "Reconciliation task panicked"),
            }
        }
        records.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        records
    }

    /// Runs a pass and folds its outcome into the task status
    pub async fn run_tracked(self: &Arc<Self>, kind: ExecutionKind) -> Vec<ExecutionRecord> {
        let now = Utc::now();
        {
            let mut status = self.status.write().await;
            status.last_run = Some(now);
            status.run_count += 1;
        }

        let records = self.run_pass(kind).await;
        let failures: Vec<&ExecutionRecord> = records
            .iter()
            .filter(|r| r.status == ExecutionStatus::Failure)
            .collect();

        let mut status = self.status.write().await;
        if failures.is_empty() {
            status.last_success = Some(now);
            status.success_count += 1;
            status.last_error = None;
        } else {
            status.error_count += 1;
            status.last_error = Some(
                failures
                    .iter()
                    .map(|r| format!("{}: {}", r.site_id, r.details))
                    .join("; "),
            );
        }
        records
    }

    /// Startup pass, then a continuous pass every `tick_seconds`
    pub async fn run(self: Arc<Self>, tick_seconds: u64, run_on_startup: bool) {
        if run_on_startup {
            info!("Running startup reconciliation");
            self.run_tracked(ExecutionKind::Startup).await;
        }

        let period = std::time::Duration::from_secs(tick_seconds.max(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.run_tracked(ExecutionKind::Continuous).await;
        }
    }
}
