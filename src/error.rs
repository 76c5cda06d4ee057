use thiserror::Error;

use crate::models::PrayerName;

/// Errors raised by the alarm engine.
///
/// `Parse`, `UnknownPrayer` and `ScheduleDenied` are per-entry: the scheduler
/// reports them inside a [`crate::alarm::ScheduleReport`] and keeps going.
/// `StoreUnavailable` aborts the call that hit it.
#[derive(Error, Debug)]
pub enum AlarmError {
    #[error("invalid time '{raw}': expected HH:MM")]
    Parse { raw: String },

    #[error("unknown prayer '{0}'. Use: fajr, dhuhr, asr, maghrib, isha, tahajjud")]
    UnknownPrayer(String),

    #[error("exact alarm for {prayer} was refused: {reason}")]
    ScheduleDenied { prayer: PrayerName, reason: String },

    #[error("no stored time for {0}")]
    NotStored(PrayerName),

    #[error("alarm store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),
}

impl AlarmError {
    pub fn parse(raw: &str) -> Self {
        AlarmError::Parse {
            raw: raw.to_string(),
        }
    }
}
