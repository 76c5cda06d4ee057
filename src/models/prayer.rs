use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AlarmError;

/// Stable handle a wake timer is registered under. Registering again under
/// the same id replaces the earlier registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u32);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrayerName {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
    Tahajjud,
}

impl PrayerName {
    /// The five obligatory prayers. Recovery only proceeds when all of them
    /// are stored.
    pub const CORE: [PrayerName; 5] = [
        PrayerName::Fajr,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn all() -> [PrayerName; 6] {
        [
            PrayerName::Fajr,
            PrayerName::Dhuhr,
            PrayerName::Asr,
            PrayerName::Maghrib,
            PrayerName::Isha,
            PrayerName::Tahajjud,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "Fajr",
            PrayerName::Dhuhr => "Dhuhr",
            PrayerName::Asr => "Asr",
            PrayerName::Maghrib => "Maghrib",
            PrayerName::Isha => "Isha",
            PrayerName::Tahajjud => "Tahajjud",
        }
    }

    pub fn timer_id(&self) -> TimerId {
        TimerId(match self {
            PrayerName::Fajr => 1001,
            PrayerName::Dhuhr => 1002,
            PrayerName::Asr => 1003,
            PrayerName::Maghrib => 1004,
            PrayerName::Isha => 1005,
            PrayerName::Tahajjud => 1006,
        })
    }
}

impl std::fmt::Display for PrayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerName {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fajr" => Ok(PrayerName::Fajr),
            "dhuhr" | "zuhr" | "dhuhur" => Ok(PrayerName::Dhuhr),
            "asr" => Ok(PrayerName::Asr),
            "maghrib" => Ok(PrayerName::Maghrib),
            "isha" => Ok(PrayerName::Isha),
            "tahajjud" => Ok(PrayerName::Tahajjud),
            _ => Err(AlarmError::UnknownPrayer(s.to_string())),
        }
    }
}

/// One named time-of-day record. `time` is kept as supplied; it is only
/// normalized when the entry is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerEntry {
    pub name: PrayerName,
    pub time: String,
    pub enabled: bool,
}

impl PrayerEntry {
    pub fn new(name: PrayerName, time: impl Into<String>, enabled: bool) -> Self {
        Self {
            name,
            time: time.into(),
            enabled,
        }
    }
}
