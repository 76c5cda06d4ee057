use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS alarm_prefs (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    ")
}
