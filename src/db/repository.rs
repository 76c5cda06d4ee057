use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

// ─── Alarm preferences ──────────────────────────────────────────────────────

/// Flat key/value access to the `alarm_prefs` table. Works on a plain
/// connection or on an open transaction.
pub struct PrefsRepo;

impl PrefsRepo {
    pub fn get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM alarm_prefs WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO alarm_prefs (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// All rows in one statement, so the result is a consistent snapshot.
    pub fn get_all(conn: &Connection) -> rusqlite::Result<HashMap<String, String>> {
        let mut stmt = conn.prepare("SELECT key, value FROM alarm_prefs")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect()
    }

    pub fn clear_all(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM alarm_prefs", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    #[test]
    fn set_overwrites_existing_key() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(PrefsRepo::get(&conn, "Fajr_time").unwrap(), None);
        PrefsRepo::set(&conn, "Fajr_time", "05:12").unwrap();
        PrefsRepo::set(&conn, "Fajr_time", "05:14").unwrap();
        assert_eq!(PrefsRepo::get(&conn, "Fajr_time").unwrap().as_deref(), Some("05:14"));
        assert_eq!(PrefsRepo::get_all(&conn).unwrap().len(), 1);

        PrefsRepo::clear_all(&conn).unwrap();
        assert!(PrefsRepo::get_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn migrations_are_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }
}
