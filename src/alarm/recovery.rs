use chrono::{DateTime, Local};
use std::sync::Arc;

use crate::alarm::scheduler::{ScheduleReport, Scheduler};
use crate::alarm::store::AlarmStore;
use crate::error::AlarmError;
use crate::models::PrayerName;

/// Re-arms stored alarms after a restart. Timers do not outlive the process,
/// the store does.
pub struct Recovery {
    store: Arc<dyn AlarmStore>,
    scheduler: Arc<Scheduler>,
}

impl Recovery {
    pub fn new(store: Arc<dyn AlarmStore>, scheduler: Arc<Scheduler>) -> Self {
        Self { store, scheduler }
    }

    /// A partial core set is treated as no set at all, so we never arm some
    /// prayers and silently miss the others.
    pub fn on_restart(&self, now: DateTime<Local>) -> Result<Option<ScheduleReport>, AlarmError> {
        let Some(mut entries) = self.store.core_set()? else {
            log::info!("No complete set of stored prayer times; nothing to re-arm");
            return Ok(None);
        };
        if let Some(tahajjud) = self.store.get(PrayerName::Tahajjud)? {
            entries.push(tahajjud);
        }

        log::info!("Re-arming {} stored alarms", entries.len());
        self.scheduler.schedule_all(&entries, now).map(Some)
    }
}
