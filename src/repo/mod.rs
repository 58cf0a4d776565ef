pub mod schedules;

use std::sync::Arc;

pub use schedules::{ImportResult, RepoError, ScheduleRepository};

#[derive(Debug, Default)]
pub struct Repositories {
    pub schedules: Arc<ScheduleRepository>,
}

impl Repositories {
    pub fn new() -> Self {
        Self::default()
    }
}
