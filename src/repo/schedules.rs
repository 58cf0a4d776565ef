use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::Schedule;

#[derive(Debug, Error, PartialEq)]
pub enum RepoError {
    #[error("Schedule group {0} not found")]
    NotFound(Uuid),
    #[error("Schedule group {0} already exists")]
    Conflict(Uuid),
    #[error("A maximum of {max} schedules can be imported at one time, got {got}")]
    ImportLimit { max: usize, got: usize },
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported_count: usize,
    pub skipped_duplicate_names: Vec<String>,
    pub skipped_duplicate_content: Vec<String>,
}

/// In-memory schedule store keyed by schedule group.
///
/// Reads hand out clones; every write replaces a whole group, so a reader
/// never observes a half-updated schedule.
#[derive(Debug, Default)]
pub struct ScheduleRepository {
    groups: RwLock<BTreeMap<Uuid, Schedule>>,
}

impl ScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All schedules, ordered by site then name
    pub fn list(&self) -> Vec<Schedule> {
        let mut all: Vec<Schedule> = self.groups.read().values().cloned().collect();
        all.sort_by(|a, b| {
            (&a.energy_site_id, &a.name, a.schedule_group_id)
                .cmp(&(&b.energy_site_id, &b.name, b.schedule_group_id))
        });
        all
    }

    pub fn list_for_site(&self, site_id: &str) -> Vec<Schedule> {
        self.list()
            .into_iter()
            .filter(|s| s.energy_site_id == site_id)
            .collect()
    }

    /// Distinct sites that have at least one schedule
    pub fn site_ids(&self) -> Vec<String> {
        let groups = self.groups.read();
        let mut ids: Vec<String> = groups
            .values()
            .map(|s| s.energy_site_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort();
        ids
    }

    pub fn get(&self, id: Uuid) -> Option<Schedule> {
        self.groups.read().get(&id).cloned()
    }

    pub fn create(&self, schedule: Schedule) -> Result<Schedule, RepoError> {
        let mut groups = self.groups.write();
        if groups.contains_key(&schedule.schedule_group_id) {
            return Err(RepoError::Conflict(schedule.schedule_group_id));
        }
        debug!(id = %schedule.schedule_group_id, name = %schedule.name, "Creating schedule");
        groups.insert(schedule.schedule_group_id, schedule.clone());
        Ok(schedule)
    }

    /// Replaces a whole group. The stored id always wins over the payload's.
    pub fn update(&self, id: Uuid, mut schedule: Schedule) -> Result<Schedule, RepoError> {
        let mut groups = self.groups.write();
        let slot = groups.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        schedule.schedule_group_id = id;
        *slot = schedule.clone();
        debug!(%id, "Updated schedule");
        Ok(schedule)
    }

    /// Sets `enabled`, or flips it when `enabled` is `None`
    pub fn toggle(
        &self,
        id: Uuid,
        enabled: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Schedule, RepoError> {
        let mut groups = self.groups.write();
        let schedule = groups.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        schedule.enabled = enabled.unwrap_or(!schedule.enabled);
        schedule.updated_at = now;
        debug!(%id, enabled = schedule.enabled, "Toggled schedule");
        Ok(schedule.clone())
    }

    pub fn delete(&self, id: Uuid) -> Result<Schedule, RepoError> {
        self.groups.write().remove(&id).ok_or(RepoError::NotFound(id))
    }

    /// Adds parsed schedules in one step.
    ///
    /// Records whose name already exists on the same site, or whose content
    /// duplicates an existing schedule there, are skipped and reported. Group
    /// ids that collide with stored ones are replaced with fresh ids. Either
    /// every remaining record is stored or, when the cap is exceeded, none.
    pub fn import(
        &self,
        schedules: Vec<Schedule>,
        max_records: usize,
    ) -> Result<ImportResult, RepoError> {
        if schedules.len() > max_records {
            return Err(RepoError::ImportLimit {
                max: max_records,
                got: schedules.len(),
            });
        }

        let mut groups = self.groups.write();
        let mut result = ImportResult::default();
        let mut accepted: Vec<Schedule> = Vec::new();

        for mut schedule in schedules {
            let same_site = groups
                .values()
                .chain(accepted.iter())
                .filter(|s| s.energy_site_id == schedule.energy_site_id);

            let mut name_taken = false;
            let mut content_taken = false;
            for existing in same_site {
                name_taken |= existing.name == schedule.name;
                content_taken |= existing.same_content(&schedule);
            }

            if name_taken {
                result.skipped_duplicate_names.push(schedule.name);
                continue;
            }
            if content_taken {
                result.skipped_duplicate_content.push(schedule.name);
                continue;
            }

            let id_taken = |id: &Uuid| {
                groups.contains_key(id) || accepted.iter().any(|s| s.schedule_group_id == *id)
            };
            if id_taken(&schedule.schedule_group_id) {
                schedule.schedule_group_id = Uuid::new_v4();
            }
            accepted.push(schedule);
        }

        result.imported_count = accepted.len();
        for schedule in accepted {
            groups.insert(schedule.schedule_group_id, schedule);
        }

        info!(
            imported = result.imported_count,
            duplicate_names = result.skipped_duplicate_names.len(),
            duplicate_content = result.skipped_duplicate_content.len(),
            "Schedule import committed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::fixtures::{schedule, time};

    #[test]
    fn test_crud_cycle() {
        let repo = ScheduleRepository::new();
        let s = repo.create(schedule("evening")).unwrap();
        let id = s.schedule_group_id;

        assert_eq!(repo.get(id), Some(s.clone()));
        assert_eq!(repo.create(s.clone()), Err(RepoError::Conflict(id)));

        let mut edited = s.clone();
        edited.permanent_off_peak_backup_percent = 60;
        edited.schedule_group_id = Uuid::new_v4();
        let stored = repo.update(id, edited).unwrap();
        assert_eq!(stored.schedule_group_id, id);
        assert_eq!(repo.get(id).unwrap().permanent_off_peak_backup_percent, 60);

        assert_eq!(repo.delete(id).unwrap().schedule_group_id, id);
        assert_eq!(repo.get(id), None);
        assert_eq!(repo.delete(id), Err(RepoError::NotFound(id)));
    }

    #[test]
    fn test_toggle_flips_or_sets() {
        let repo = ScheduleRepository::new();
        let id = repo.create(schedule("evening")).unwrap().schedule_group_id;
        let now = Utc::now();

        assert!(!repo.toggle(id, None, now).unwrap().enabled);
        assert!(repo.toggle(id, None, now).unwrap().enabled);
        assert!(repo.toggle(id, Some(true), now).unwrap().enabled);
        assert_eq!(repo.get(id).unwrap().updated_at, now);
    }

    #[test]
    fn test_import_skips_duplicates() {
        let repo = ScheduleRepository::new();
        repo.create(schedule("evening")).unwrap();

        let same_name = {
            let mut s = schedule("evening");
            s.start_time = time(6, 0);
            s.end_time = time(9, 0);
            s
        };
        let same_content = schedule("evening copy");
        let fresh = {
            let mut s = schedule("morning");
            s.start_time = time(6, 0);
            s.end_time = time(9, 0);
            s
        };
        let fresh_again = {
            let mut s = fresh.clone();
            s.schedule_group_id = Uuid::new_v4();
            s.name = "morning again".into();
            s
        };

        let result = repo
            .import(vec![same_name, same_content, fresh, fresh_again], 100)
            .unwrap();

        assert_eq!(result.imported_count, 1);
        assert_eq!(result.skipped_duplicate_names, vec!["evening".to_string()]);
        assert_eq!(
            result.skipped_duplicate_content,
            vec!["evening copy".to_string(), "morning again".to_string()]
        );
        assert_eq!(repo.list().len(), 2);
    }

    #[test]
    fn test_import_is_per_site() {
        let repo = ScheduleRepository::new();
        repo.create(schedule("evening")).unwrap();

        let mut other_site = schedule("evening");
        other_site.energy_site_id = "site-2".into();
        let result = repo.import(vec![other_site], 100).unwrap();

        assert_eq!(result.imported_count, 1);
        assert_eq!(repo.site_ids(), vec!["site-1".to_string(), "site-2".to_string()]);
    }

    #[test]
    fn test_import_over_cap_commits_nothing() {
        let repo = ScheduleRepository::new();
        let batch: Vec<Schedule> = (0..3)
            .map(|i| {
                let mut s = schedule(&format!("s{i}"));
                s.permanent_off_peak_backup_percent = 50 + i;
                s
            })
            .collect();

        assert_eq!(
            repo.import(batch, 2),
            Err(RepoError::ImportLimit { max: 2, got: 3 })
        );
        assert!(repo.list().is_empty());
    }

    #[test]
    fn test_import_reassigns_colliding_ids() {
        let repo = ScheduleRepository::new();
        let existing = repo.create(schedule("evening")).unwrap();

        let mut incoming = schedule("night");
        incoming.schedule_group_id = existing.schedule_group_id;
        incoming.start_time = time(22, 0);
        incoming.end_time = time(6, 0);

        repo.import(vec![incoming], 100).unwrap();
        let all = repo.list();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0].schedule_group_id, all[1].schedule_group_id);
    }
}
