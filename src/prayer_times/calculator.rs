use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use salah::prelude::*;

use crate::alarm::normalize::format_hhmm;
use crate::config::settings::SalahConfig;
use crate::models::{PrayerEntry, PrayerName};

#[derive(Debug, Clone)]
pub struct PrayerTimesLocal {
    pub fajr: NaiveTime,
    pub sunrise: NaiveTime,
    pub dhuhr: NaiveTime,
    pub asr: NaiveTime,
    pub maghrib: NaiveTime,
    pub isha: NaiveTime,
}

impl PrayerTimesLocal {
    pub fn time_of(&self, name: PrayerName) -> Option<NaiveTime> {
        match name {
            PrayerName::Fajr => Some(self.fajr),
            PrayerName::Dhuhr => Some(self.dhuhr),
            PrayerName::Asr => Some(self.asr),
            PrayerName::Maghrib => Some(self.maghrib),
            PrayerName::Isha => Some(self.isha),
            PrayerName::Tahajjud => None,
        }
    }
}

/// Offline time source: computes the five daily times for the configured
/// location in the local zone.
pub struct PrayerCalculator {
    pub lat: f64,
    pub lng: f64,
    pub method_str: String,
    pub madhab_str: String,
}

impl PrayerCalculator {
    pub fn new(lat: f64, lng: f64, method: &str, madhab: &str) -> Result<Self> {
        // Validate method + madhab early
        parse_method(method)?;
        parse_madhab(madhab)?;
        Ok(Self {
            lat,
            lng,
            method_str: method.to_string(),
            madhab_str: madhab.to_string(),
        })
    }

    pub fn from_config(salah: &SalahConfig) -> Result<Self> {
        Self::new(salah.latitude, salah.longitude, &salah.calc_method, &salah.madhab)
    }

    pub fn times_for_date(&self, date: NaiveDate) -> Result<PrayerTimesLocal> {
        let coords = Coordinates::new(self.lat, self.lng);
        let method = parse_method(&self.method_str)?;
        let madhab = parse_madhab(&self.madhab_str)?;
        let params = Configuration::with(method, madhab);

        let times = PrayerSchedule::new()
            .on(date)
            .for_location(coords)
            .with_configuration(params)
            .calculate()
            .map_err(|e| anyhow!("Prayer calculation failed: {}", e))?;

        let to_local = |utc: chrono::DateTime<chrono::Utc>| -> NaiveTime {
            utc.with_timezone(&Local).time()
        };

        Ok(PrayerTimesLocal {
            fajr: to_local(times.time(Prayer::Fajr)),
            sunrise: to_local(times.time(Prayer::Sunrise)),
            dhuhr: to_local(times.time(Prayer::Dhuhr)),
            asr: to_local(times.time(Prayer::Asr)),
            maghrib: to_local(times.time(Prayer::Maghrib)),
            isha: to_local(times.time(Prayer::Isha)),
        })
    }

    /// The five core entries for `date`, enabled flags taken from `enabled`
    /// so a refresh never re-enables a prayer the user switched off.
    pub fn entries_for_date(
        &self,
        date: NaiveDate,
        enabled: impl Fn(PrayerName) -> bool,
    ) -> Result<Vec<PrayerEntry>> {
        let times = self.times_for_date(date)?;
        Ok(PrayerName::CORE
            .iter()
            .filter_map(|name| {
                times
                    .time_of(*name)
                    .map(|t| PrayerEntry::new(*name, format_hhmm(t), enabled(*name)))
            })
            .collect())
    }
}

fn parse_method(s: &str) -> Result<Method> {
    match s {
        "MuslimWorldLeague" => Ok(Method::MuslimWorldLeague),
        "Egyptian" => Ok(Method::Egyptian),
        "Karachi" => Ok(Method::Karachi),
        "UmmAlQura" => Ok(Method::UmmAlQura),
        "Dubai" => Ok(Method::Dubai),
        "MoonsightingCommittee" => Ok(Method::MoonsightingCommittee),
        "NorthAmerica" => Ok(Method::NorthAmerica),
        "Kuwait" => Ok(Method::Kuwait),
        "Qatar" => Ok(Method::Qatar),
        "Singapore" => Ok(Method::Singapore),
        "Tehran" => Ok(Method::Tehran),
        "Turkey" => Ok(Method::Turkey),
        "Other" => Ok(Method::Other),
        _ => Err(anyhow!(
            "Unknown calculation method: '{}'. Use one of: {}",
            s,
            CALC_METHODS.join(", ")
        )),
    }
}

fn parse_madhab(s: &str) -> Result<Madhab> {
    match s {
        "Hanafi" => Ok(Madhab::Hanafi),
        "Shafi" | "Shafi'i" => Ok(Madhab::Shafi),
        _ => Err(anyhow!("Unknown madhab: '{}'", s)),
    }
}

pub const CALC_METHODS: &[&str] = &[
    "MuslimWorldLeague",
    "Egyptian",
    "Karachi",
    "UmmAlQura",
    "Dubai",
    "MoonsightingCommittee",
    "NorthAmerica",
    "Kuwait",
    "Qatar",
    "Singapore",
    "Tehran",
    "Turkey",
    "Other",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::normalize::normalize;

    fn islamabad() -> PrayerCalculator {
        PrayerCalculator::new(33.6938, 73.0651, "Karachi", "Hanafi").unwrap()
    }

    #[test]
    fn rejects_unknown_method_and_madhab() {
        assert!(PrayerCalculator::new(0.0, 0.0, "Lunar", "Hanafi").is_err());
        assert!(PrayerCalculator::new(0.0, 0.0, "Karachi", "Maliki").is_err());
    }

    #[test]
    fn produces_five_parseable_entries() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let entries = islamabad()
            .entries_for_date(date, |name| name != PrayerName::Asr)
            .unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name).collect();
        assert_eq!(names, PrayerName::CORE.to_vec());
        for entry in &entries {
            assert!(normalize(&entry.time).is_ok(), "{} -> {}", entry.name, entry.time);
        }
        assert!(!entries[2].enabled);
        assert!(entries[0].enabled);
    }
}
