use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::alarm::AlarmStore;
use crate::alarm::normalize::{format_hhmm, normalize};
use crate::alarm::trigger::next_trigger;
use crate::config::AppConfig;
use crate::error::AlarmError;
use crate::models::{PrayerEntry, PrayerName};
use crate::prayer_times::PrayerCalculator;
use crate::utils::format::{display_time, format_duration_secs, format_time};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

// ─── Shared ──────────────────────────────────────────────────────────────────

/// The day's full alarm set: five computed times plus Tahajjud.
///
/// Enabled flags already in the store are kept, so a refresh never turns back
/// on a prayer the user switched off. Tahajjud keeps its stored custom time;
/// without one it comes from `[alarm]` in the config.
pub fn refresh_entries(
    store: &dyn AlarmStore,
    config: &AppConfig,
    date: NaiveDate,
) -> Result<Vec<PrayerEntry>> {
    let stored = store.entries()?;
    let enabled = |name: PrayerName| {
        stored
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.enabled)
            .unwrap_or(true)
    };

    let calc = PrayerCalculator::from_config(&config.salah)?;
    let mut entries = calc.entries_for_date(date, enabled)?;

    let tahajjud = match stored.iter().find(|e| e.name == PrayerName::Tahajjud) {
        Some(entry) => entry.clone(),
        None => {
            let time = normalize(&config.alarm.tahajjud_time)
                .context("Invalid alarm.tahajjud_time in config")?;
            PrayerEntry::new(
                PrayerName::Tahajjud,
                format_hhmm(time),
                config.alarm.tahajjud_enabled,
            )
        }
    };
    entries.push(tahajjud);
    Ok(entries)
}

/// The enabled entry that rings soonest after `now`.
pub fn next_alarm(entries: &[PrayerEntry], now: DateTime<Local>) -> Option<(PrayerName, DateTime<Local>)> {
    entries
        .iter()
        .filter(|e| e.enabled)
        .filter_map(|e| normalize(&e.time).ok().map(|t| (e.name, next_trigger(t, now))))
        .min_by_key(|(_, at)| *at)
}

fn parse_prayer(raw: &str) -> Result<PrayerName> {
    Ok(raw.parse::<PrayerName>()?)
}

// ─── Times ───────────────────────────────────────────────────────────────────

pub fn handle_times(store: &dyn AlarmStore, config: &AppConfig) -> Result<()> {
    let now = Local::now();
    let today = now.date_naive();
    let use_24h = config.alarm.time_format_24h;

    let calc = PrayerCalculator::from_config(&config.salah)?;
    let times = calc.times_for_date(today)?;

    println!();
    println_colored!(
        GOLD,
        "  Prayer Times - {} ({})",
        config.salah.location_name,
        today.format("%Y-%m-%d")
    );
    println!();

    let rows = [
        ("Fajr", times.fajr),
        ("Sunrise", times.sunrise),
        ("Dhuhr", times.dhuhr),
        ("Asr", times.asr),
        ("Maghrib", times.maghrib),
        ("Isha", times.isha),
    ];
    for (name, time) in &rows {
        let time_str = format_time(*time, use_24h);
        if *time < now.time() {
            println_colored!(DIM, "  {:<10}  {}", name, time_str);
        } else {
            println_colored!(BOLD, "  {:<10}  {}", name, time_str);
        }
    }

    let entries = store.entries()?;
    println!();
    match next_alarm(&entries, now) {
        Some((name, at)) => {
            println_colored!(
                AMBER,
                "  Next alarm: {} at {} (in {})",
                name,
                format_time(at.time(), use_24h),
                format_duration_secs((at - now).num_seconds())
            );
        }
        None if entries.is_empty() => {
            println_colored!(DIM, "  No alarms stored. Run `azan-alarm refresh` to set them up.");
        }
        None => {
            println_colored!(DIM, "  All alarms are off");
        }
    }
    println!();
    Ok(())
}

// ─── Refresh ─────────────────────────────────────────────────────────────────

pub fn handle_refresh(store: &dyn AlarmStore, config: &AppConfig) -> Result<()> {
    let today = Local::now().date_naive();
    let entries = refresh_entries(store, config, today)?;
    store.put_all(&entries).context("Saving prayer times")?;

    println_colored!(
        GREEN,
        "  ✓ Stored {} alarm times for {}",
        entries.len(),
        config.salah.location_name
    );
    for entry in &entries {
        let time = display_time(&entry.time, config.alarm.time_format_24h);
        if entry.enabled {
            println!("  {:<10}  {}", entry.name, time);
        } else {
            println_colored!(DIM, "  {:<10}  {}  (off)", entry.name, time);
        }
    }
    Ok(())
}

// ─── Edit ────────────────────────────────────────────────────────────────────

pub fn handle_set(store: &dyn AlarmStore, prayer: &str, time: &str, use_24h: bool) -> Result<()> {
    let name = parse_prayer(prayer)?;
    let parsed = normalize(time)?;
    let enabled = store.get(name)?.map(|e| e.enabled).unwrap_or(true);

    store.put(&PrayerEntry::new(name, format_hhmm(parsed), enabled))?;
    println_colored!(GREEN, "  ✓ {} alarm set for {}", name, format_time(parsed, use_24h));
    if !enabled {
        println_colored!(DIM, "  (currently off; `azan-alarm enable {}` to turn it on)", prayer);
    }
    Ok(())
}

pub fn handle_toggle(store: &dyn AlarmStore, prayer: &str, enabled: bool) -> Result<()> {
    let name = parse_prayer(prayer)?;
    let entry = store
        .set_enabled(name, enabled)?
        .ok_or(AlarmError::NotStored(name))
        .context("Run `azan-alarm refresh` or `azan-alarm set` first")?;

    if entry.enabled {
        println_colored!(GREEN, "  ✓ {} alarm on ({})", entry.name, entry.time);
    } else {
        println_colored!(AMBER, "  {} alarm off", entry.name);
    }
    Ok(())
}

pub fn handle_reset(store: &dyn AlarmStore) -> Result<()> {
    store.clear()?;
    println_colored!(AMBER, "  Cleared all stored alarms");
    Ok(())
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatusRow {
    pub name: PrayerName,
    pub time: String,
    pub enabled: bool,
    pub next_trigger: Option<DateTime<Local>>,
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub alarms: Vec<StatusRow>,
    pub last_updated: Option<i64>,
}

pub fn status(store: &dyn AlarmStore, now: DateTime<Local>) -> Result<Status> {
    let alarms = store
        .entries()?
        .into_iter()
        .map(|entry| {
            let next_trigger = if entry.enabled {
                normalize(&entry.time).ok().map(|t| next_trigger(t, now))
            } else {
                None
            };
            StatusRow {
                name: entry.name,
                time: entry.time,
                enabled: entry.enabled,
                next_trigger,
            }
        })
        .collect();
    Ok(Status {
        alarms,
        last_updated: store.last_updated()?,
    })
}

pub fn handle_status(store: &dyn AlarmStore, json: bool, use_24h: bool) -> Result<()> {
    let now = Local::now();
    let status = status(store, now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    if status.alarms.is_empty() {
        println_colored!(DIM, "  No alarms stored. Run `azan-alarm refresh` to set them up.");
        println!();
        return Ok(());
    }

    println_colored!(GOLD, "  Alarms");
    println!();
    for row in &status.alarms {
        let time = display_time(&row.time, use_24h);
        match row.next_trigger {
            Some(at) => println!(
                "  {:<10}  {:>8}  on   rings in {}",
                row.name,
                time,
                format_duration_secs((at - now).num_seconds())
            ),
            None if row.enabled => {
                println_colored!(AMBER, "  {:<10}  {:>8}  on   (unreadable time)", row.name, time);
            }
            None => println_colored!(DIM, "  {:<10}  {:>8}  off", row.name, time),
        }
    }
    println!();
    Ok(())
}
