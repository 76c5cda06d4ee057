use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::PrayerName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Armed { at: DateTime<Local> },
    Fired,
}

/// Per-prayer view of the timer lifecycle, shared between the scheduler
/// (arms and cancels) and the dispatcher (fires).
#[derive(Default)]
pub struct AlarmBoard {
    slots: Mutex<HashMap<PrayerName, AlarmState>>,
}

impl AlarmBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<PrayerName, AlarmState>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self, name: PrayerName) -> AlarmState {
        self.slots().get(&name).copied().unwrap_or(AlarmState::Idle)
    }

    pub fn set(&self, name: PrayerName, state: AlarmState) {
        self.slots().insert(name, state);
    }

    /// Return a fired alarm to `Idle`. A re-arm that raced the firing wins.
    pub fn settle_fired(&self, name: PrayerName) {
        let mut slots = self.slots();
        if slots.get(&name) == Some(&AlarmState::Fired) {
            slots.insert(name, AlarmState::Idle);
        }
    }

    pub fn snapshot(&self) -> Vec<(PrayerName, AlarmState)> {
        PrayerName::all()
            .into_iter()
            .map(|name| (name, self.state(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_prayers_are_idle() {
        let board = AlarmBoard::new();
        assert_eq!(board.state(PrayerName::Fajr), AlarmState::Idle);
        assert_eq!(board.snapshot().len(), 6);
    }

    #[test]
    fn settle_does_not_clobber_a_rearm() {
        let board = AlarmBoard::new();
        let at = Local::now();

        board.set(PrayerName::Asr, AlarmState::Fired);
        board.set(PrayerName::Asr, AlarmState::Armed { at });
        board.settle_fired(PrayerName::Asr);
        assert_eq!(board.state(PrayerName::Asr), AlarmState::Armed { at });

        board.set(PrayerName::Asr, AlarmState::Fired);
        board.settle_fired(PrayerName::Asr);
        assert_eq!(board.state(PrayerName::Asr), AlarmState::Idle);
    }
}
