use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::alarm::normalize::normalize;
use crate::db::migrations::run_migrations;
use crate::db::repository::PrefsRepo;
use crate::error::AlarmError;
use crate::models::{PrayerEntry, PrayerName};

const LAST_UPDATED: &str = "last_updated";

fn time_key(name: PrayerName) -> String {
    format!("{}_time", name.display_name())
}

fn enabled_key(name: PrayerName) -> String {
    format!("{}_enabled", name.display_name())
}

/// Durable `name -> {time, enabled}` map shared by the scheduler, the
/// dispatcher and the recovery pass.
pub trait AlarmStore: Send + Sync {
    /// Upsert a batch atomically. Returns the new `last_updated` stamp.
    fn put_all(&self, entries: &[PrayerEntry]) -> Result<i64, AlarmError>;

    fn put(&self, entry: &PrayerEntry) -> Result<i64, AlarmError> {
        self.put_all(std::slice::from_ref(entry))
    }

    fn get(&self, name: PrayerName) -> Result<Option<PrayerEntry>, AlarmError>;

    /// Flip the enabled flag of a stored entry, keeping its time. Returns the
    /// updated entry, or `None` when nothing is stored under `name`.
    fn set_enabled(&self, name: PrayerName, enabled: bool)
    -> Result<Option<PrayerEntry>, AlarmError>;

    /// Every stored entry, in prayer order.
    fn entries(&self) -> Result<Vec<PrayerEntry>, AlarmError>;

    /// The five core entries, only if all five are stored with valid times.
    fn core_set(&self) -> Result<Option<Vec<PrayerEntry>>, AlarmError>;

    fn last_updated(&self) -> Result<Option<i64>, AlarmError>;

    fn clear(&self) -> Result<(), AlarmError>;
}

pub struct SqliteAlarmStore {
    conn: Mutex<Connection>,
}

impl SqliteAlarmStore {
    pub fn new(conn: Connection) -> Result<Self, AlarmError> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open (or create) the store at `path`. WAL mode lets the CLI write
    /// while the daemon holds its own connection.
    pub fn open(path: &Path) -> Result<Self, AlarmError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::new(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, AlarmError> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn break_for_tests(&self) {
        self.conn().execute_batch("DROP TABLE alarm_prefs;").unwrap();
    }
}

impl AlarmStore for SqliteAlarmStore {
    fn put_all(&self, entries: &[PrayerEntry]) -> Result<i64, AlarmError> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for entry in entries {
            PrefsRepo::set(&tx, &time_key(entry.name), &entry.time)?;
            PrefsRepo::set(&tx, &enabled_key(entry.name), flag(entry.enabled))?;
        }
        let stamp = bump_last_updated(&tx)?;
        tx.commit()?;
        Ok(stamp)
    }

    fn get(&self, name: PrayerName) -> Result<Option<PrayerEntry>, AlarmError> {
        let prefs = PrefsRepo::get_all(&self.conn())?;
        Ok(entry_from(&prefs, name))
    }

    fn set_enabled(
        &self,
        name: PrayerName,
        enabled: bool,
    ) -> Result<Option<PrayerEntry>, AlarmError> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(time) = PrefsRepo::get(&tx, &time_key(name))? else {
            return Ok(None);
        };
        PrefsRepo::set(&tx, &enabled_key(name), flag(enabled))?;
        bump_last_updated(&tx)?;
        tx.commit()?;
        Ok(Some(PrayerEntry::new(name, time, enabled)))
    }

    fn entries(&self) -> Result<Vec<PrayerEntry>, AlarmError> {
        let prefs = PrefsRepo::get_all(&self.conn())?;
        Ok(PrayerName::all()
            .into_iter()
            .filter_map(|name| entry_from(&prefs, name))
            .collect())
    }

    fn core_set(&self) -> Result<Option<Vec<PrayerEntry>>, AlarmError> {
        let prefs = PrefsRepo::get_all(&self.conn())?;
        Ok(core_set_from(&prefs))
    }

    fn last_updated(&self) -> Result<Option<i64>, AlarmError> {
        let value = PrefsRepo::get(&self.conn(), LAST_UPDATED)?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    fn clear(&self) -> Result<(), AlarmError> {
        PrefsRepo::clear_all(&self.conn())?;
        Ok(())
    }
}

fn flag(enabled: bool) -> &'static str {
    if enabled { "1" } else { "0" }
}

/// A missing `_enabled` key reads as enabled.
fn entry_from(prefs: &HashMap<String, String>, name: PrayerName) -> Option<PrayerEntry> {
    let time = prefs.get(&time_key(name))?;
    let enabled = prefs
        .get(&enabled_key(name))
        .map(|v| v != "0")
        .unwrap_or(true);
    Some(PrayerEntry::new(name, time.clone(), enabled))
}

fn core_set_from(prefs: &HashMap<String, String>) -> Option<Vec<PrayerEntry>> {
    let mut set = Vec::with_capacity(PrayerName::CORE.len());
    for name in PrayerName::CORE {
        let entry = entry_from(prefs, name)?;
        if normalize(&entry.time).is_err() {
            log::warn!("Stored time for {} is invalid: '{}'", name, entry.time);
            return None;
        }
        set.push(entry);
    }
    Some(set)
}

fn bump_last_updated(conn: &Connection) -> rusqlite::Result<i64> {
    let previous = PrefsRepo::get(conn, LAST_UPDATED)?
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let stamp = Utc::now().timestamp_millis().max(previous + 1);
    PrefsRepo::set(conn, LAST_UPDATED, &stamp.to_string())?;
    Ok(stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_entries() -> Vec<PrayerEntry> {
        vec![
            PrayerEntry::new(PrayerName::Fajr, "05:12", true),
            PrayerEntry::new(PrayerName::Dhuhr, "12:30", true),
            PrayerEntry::new(PrayerName::Asr, "15:45", false),
            PrayerEntry::new(PrayerName::Maghrib, "18:05", true),
            PrayerEntry::new(PrayerName::Isha, "19:35", true),
        ]
    }

    #[test]
    fn put_upserts_by_name() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.put(&PrayerEntry::new(PrayerName::Fajr, "05:12", true)).unwrap();
        store.put(&PrayerEntry::new(PrayerName::Fajr, "05:14", false)).unwrap();

        let fajr = store.get(PrayerName::Fajr).unwrap().unwrap();
        assert_eq!(fajr, PrayerEntry::new(PrayerName::Fajr, "05:14", false));
        assert_eq!(store.entries().unwrap().len(), 1);
        assert!(store.get(PrayerName::Isha).unwrap().is_none());
    }

    #[test]
    fn last_updated_strictly_increases() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        assert_eq!(store.last_updated().unwrap(), None);

        let mut previous = 0;
        for _ in 0..20 {
            let stamp = store.put(&PrayerEntry::new(PrayerName::Isha, "19:35", true)).unwrap();
            assert!(stamp > previous);
            assert_eq!(store.last_updated().unwrap(), Some(stamp));
            previous = stamp;
        }
    }

    #[test]
    fn core_set_requires_all_five() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        let mut entries = core_entries();
        let isha = entries.pop().unwrap();

        store.put_all(&entries).unwrap();
        store.put(&PrayerEntry::new(PrayerName::Tahajjud, "02:00", true)).unwrap();
        assert!(store.core_set().unwrap().is_none());

        store.put(&isha).unwrap();
        let set = store.core_set().unwrap().expect("complete core set");
        assert_eq!(set, core_entries());
    }

    #[test]
    fn core_set_with_corrupt_time_is_absent() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        let mut entries = core_entries();
        entries[2].time = "quarter past".to_string();
        store.put_all(&entries).unwrap();
        assert!(store.core_set().unwrap().is_none());
    }

    #[test]
    fn missing_enabled_flag_reads_as_enabled() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        PrefsRepo::set(&store.conn(), "Maghrib_time", "18:05").unwrap();
        let maghrib = store.get(PrayerName::Maghrib).unwrap().unwrap();
        assert!(maghrib.enabled);
    }

    #[test]
    fn set_enabled_keeps_time() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        assert!(store.set_enabled(PrayerName::Asr, false).unwrap().is_none());

        store.put(&PrayerEntry::new(PrayerName::Asr, "15:45", true)).unwrap();
        let off = store.set_enabled(PrayerName::Asr, false).unwrap().unwrap();
        assert_eq!(off, PrayerEntry::new(PrayerName::Asr, "15:45", false));
        assert_eq!(store.get(PrayerName::Asr).unwrap(), Some(off));
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.db");
        {
            let store = SqliteAlarmStore::open(&path).unwrap();
            store.put_all(&core_entries()).unwrap();
        }
        let store = SqliteAlarmStore::open(&path).unwrap();
        assert_eq!(store.core_set().unwrap(), Some(core_entries()));
        assert!(store.last_updated().unwrap().is_some());
    }

    #[test]
    fn core_set_never_mixes_batches_under_concurrent_writes() {
        fn batch(minute: &str) -> Vec<PrayerEntry> {
            PrayerName::CORE
                .iter()
                .zip(["05", "12", "15", "18", "20"])
                .map(|(name, hour)| PrayerEntry::new(*name, format!("{}:{}", hour, minute), true))
                .collect()
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.db");
        SqliteAlarmStore::open(&path).unwrap().put_all(&batch("00")).unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let store = SqliteAlarmStore::open(&writer_path).unwrap();
            for round in 0..200 {
                let minute = if round % 2 == 0 { "30" } else { "00" };
                store.put_all(&batch(minute)).unwrap();
            }
        });

        let reader = std::thread::spawn(move || {
            let store = SqliteAlarmStore::open(&path).unwrap();
            let mut reads = 0;
            while reads < 500 {
                let set = store.core_set().unwrap().expect("core set stays complete");
                let minute = &set[0].time[3..];
                assert!(
                    set.iter().all(|e| &e.time[3..] == minute),
                    "mixed batches: {:?}",
                    set
                );
                reads += 1;
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn clear_empties_the_store() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.put_all(&core_entries()).unwrap();
        store.clear().unwrap();
        assert!(store.entries().unwrap().is_empty());
        assert!(store.core_set().unwrap().is_none());
    }

    #[test]
    fn broken_store_reports_unavailable() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.break_for_tests();
        assert!(matches!(
            store.put(&PrayerEntry::new(PrayerName::Fajr, "05:12", true)),
            Err(AlarmError::StoreUnavailable(_))
        ));
        assert!(matches!(store.core_set(), Err(AlarmError::StoreUnavailable(_))));
    }
}
