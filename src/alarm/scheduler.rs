use chrono::{DateTime, Local, NaiveTime};
use std::sync::Arc;

use crate::alarm::normalize::{format_hhmm, normalize};
use crate::alarm::state::{AlarmBoard, AlarmState};
use crate::alarm::store::AlarmStore;
use crate::alarm::timer::{TimerError, TimerPayload, WakeTimer};
use crate::alarm::trigger::next_trigger;
use crate::error::AlarmError;
use crate::models::{PrayerEntry, PrayerName};

/// What happened to one entry of a `schedule_all` batch.
#[derive(Debug)]
pub enum EntryOutcome {
    /// The deadline is on the board.
    Armed,
    Cancelled,
    /// The time string did not parse. Nothing was armed or stored.
    Skipped(AlarmError),
    /// The timer backend refused. The previous timer, if any, is untouched.
    Denied(AlarmError),
}

#[derive(Debug, Default)]
pub struct ScheduleReport {
    pub outcomes: Vec<(PrayerName, EntryOutcome)>,
    /// `last_updated` written by this call, when anything was persisted.
    pub stamp: Option<i64>,
}

impl ScheduleReport {
    #[cfg(test)]
    pub fn outcome(&self, name: PrayerName) -> Option<&EntryOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn armed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, EntryOutcome::Armed))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (PrayerName, &AlarmError)> {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            EntryOutcome::Skipped(err) | EntryOutcome::Denied(err) => Some((*name, err)),
            _ => None,
        })
    }
}

pub struct Scheduler {
    store: Arc<dyn AlarmStore>,
    timer: Arc<dyn WakeTimer>,
    board: Arc<AlarmBoard>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn AlarmStore>, timer: Arc<dyn WakeTimer>, board: Arc<AlarmBoard>) -> Self {
        Self { store, timer, board }
    }

    /// Arm every enabled entry and cancel every disabled one, then persist
    /// the batch. Only the entries passed in are touched.
    pub fn schedule_all(
        &self,
        entries: &[PrayerEntry],
        now: DateTime<Local>,
    ) -> Result<ScheduleReport, AlarmError> {
        let mut report = ScheduleReport::default();
        let mut to_persist = Vec::with_capacity(entries.len());

        for entry in entries {
            let time = match normalize(&entry.time) {
                Ok(time) => time,
                Err(err) => {
                    log::warn!("Skipping {}: {}", entry.name, err);
                    report.outcomes.push((entry.name, EntryOutcome::Skipped(err)));
                    continue;
                }
            };

            let canonical = PrayerEntry::new(entry.name, format_hhmm(time), entry.enabled);
            let outcome = if canonical.enabled {
                self.arm(&canonical, time, now)
            } else {
                self.disarm(canonical.name);
                EntryOutcome::Cancelled
            };
            report.outcomes.push((canonical.name, outcome));
            to_persist.push(canonical);
        }

        if !to_persist.is_empty() {
            match self.store.put_all(&to_persist) {
                Ok(stamp) => report.stamp = Some(stamp),
                Err(err) => {
                    log::error!(
                        "Could not save {} alarms ({} armed): {}",
                        to_persist.len(),
                        report.armed_count(),
                        err
                    );
                    for (name, failure) in report.failures() {
                        log::error!("Unsaved batch also had {}: {}", name, failure);
                    }
                    return Err(err);
                }
            }
        }
        Ok(report)
    }

    /// Cancel the timer for `name`. A stored record keeps its time and is
    /// marked disabled.
    pub fn cancel(&self, name: PrayerName) -> Result<(), AlarmError> {
        self.disarm(name);
        if self.store.set_enabled(name, false)?.is_none() {
            log::debug!("Cancelled {} with no stored record", name);
        }
        Ok(())
    }

    /// Toggle an entry using its stored time.
    pub fn set_enabled(
        &self,
        name: PrayerName,
        enabled: bool,
        now: DateTime<Local>,
    ) -> Result<ScheduleReport, AlarmError> {
        let stored = self.store.get(name)?.ok_or(AlarmError::NotStored(name))?;
        self.schedule_all(&[PrayerEntry { enabled, ..stored }], now)
    }

    fn arm(&self, entry: &PrayerEntry, time: NaiveTime, now: DateTime<Local>) -> EntryOutcome {
        let at = next_trigger(time, now);
        let payload = TimerPayload {
            name: entry.name,
            time: entry.time.clone(),
        };

        match self.timer.arm(entry.name.timer_id(), at, payload) {
            Ok(()) => {
                self.board.set(entry.name, AlarmState::Armed { at });
                log::info!(
                    "Armed {} for {} (timer {})",
                    entry.name,
                    at.format("%Y-%m-%d %H:%M"),
                    entry.name.timer_id()
                );
                EntryOutcome::Armed
            }
            Err(TimerError::Denied(reason)) => {
                log::warn!("Could not arm {}: {}", entry.name, reason);
                EntryOutcome::Denied(AlarmError::ScheduleDenied {
                    prayer: entry.name,
                    reason,
                })
            }
        }
    }

    fn disarm(&self, name: PrayerName) {
        self.timer.cancel(name.timer_id());
        self.board.set(name, AlarmState::Idle);
        log::info!("Cancelled {} (timer {})", name, name.timer_id());
    }
}
