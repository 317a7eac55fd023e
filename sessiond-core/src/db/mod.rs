//! Durable per-actor storage backed by SQLite.
//!
//! Each session actor owns one row of lifecycle state and at most one alarm
//! row, both keyed by its actor id. The alarm table's primary key is what
//! guarantees an actor never has two pending wake-ups.

pub mod types;

pub use types::*;

use crate::error::{Error, Result};
use crate::types::SessionState;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS session_state (
    actor_id    TEXT PRIMARY KEY NOT NULL,
    session_id  TEXT NOT NULL,
    status      TEXT NOT NULL,
    state_json  TEXT NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS session_alarm (
    actor_id    TEXT PRIMARY KEY NOT NULL,
    fire_at     INTEGER NOT NULL
);
";

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open database at specific path, creating parent directories and schema
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(Error::Database)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Create tables if missing. Safe to run repeatedly.
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch(SCHEMA).map_err(Error::Database)
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1").map_err(Error::Database)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the stored state for an actor
    pub fn get_state(&self, actor_id: &str) -> Result<Option<SessionState>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM session_state WHERE actor_id = ?1",
                params![actor_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Store state for an actor, replacing whatever was there
    pub fn put_state(&self, actor_id: &str, state: &SessionState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        upsert_state(&conn, actor_id, state, &json)?;
        Ok(())
    }

    /// Store state and set the actor's alarm in one transaction. Either both
    /// rows change or neither does.
    pub fn put_state_and_alarm(
        &self,
        actor_id: &str,
        state: &SessionState,
        fire_at: i64,
    ) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        upsert_state(&tx, actor_id, state, &json)?;
        tx.execute(
            "INSERT INTO session_alarm (actor_id, fire_at) VALUES (?1, ?2)
             ON CONFLICT(actor_id) DO UPDATE SET fire_at = excluded.fire_at",
            params![actor_id, fire_at],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Alarm Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the pending alarm instant for an actor
    pub fn get_alarm(&self, actor_id: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(conn
            .query_row(
                "SELECT fire_at FROM session_alarm WHERE actor_id = ?1",
                params![actor_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// All pending alarms, earliest first
    pub fn list_alarms(&self) -> Result<Vec<StoredAlarm>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt =
            conn.prepare("SELECT actor_id, fire_at FROM session_alarm ORDER BY fire_at")?;
        let alarms = stmt
            .query_map([], |row| {
                Ok(StoredAlarm {
                    actor_id: row.get(0)?,
                    fire_at: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alarms)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Actor-wide Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Erase everything stored for an actor in one transaction
    pub fn delete_all(&self, actor_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM session_state WHERE actor_id = ?1",
            params![actor_id],
        )?;
        tx.execute(
            "DELETE FROM session_alarm WHERE actor_id = ?1",
            params![actor_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Count stored sessions grouped by status
    pub fn count_sessions(&self) -> Result<SessionCounts> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM session_state GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = SessionCounts::default();
        for (status, count) in rows {
            match status.as_str() {
                "active" => counts.active += count,
                "idle-warning" => counts.idle_warning += count,
                "ended" => counts.ended += count,
                _ => counts.other += count,
            }
        }
        Ok(counts)
    }

    /// Drop the schema so every subsequent operation fails
    #[cfg(test)]
    pub(crate) fn break_for_tests(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE session_state; DROP TABLE session_alarm;")
            .unwrap();
    }

    /// Drop only the alarm table so alarm writes fail after state writes
    #[cfg(test)]
    pub(crate) fn break_alarms_for_tests(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE session_alarm;").unwrap();
    }
}

fn upsert_state(
    conn: &Connection,
    actor_id: &str,
    state: &SessionState,
    json: &str,
) -> rusqlite::Result<usize> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO session_state (actor_id, session_id, status, state_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(actor_id) DO UPDATE SET
            session_id = excluded.session_id,
            status = excluded.status,
            state_json = excluded.state_json,
            updated_at = excluded.updated_at",
        params![actor_id, state.session_id, state.status.as_str(), json, now],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionStatus;
    use tokio_test::assert_ok;

    fn sample_state(id: &str) -> SessionState {
        SessionState::new(id, 1_000, 10_000, 2_000)
    }

    #[test]
    fn test_state_put_get_overwrite() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_state("a1").unwrap().is_none());

        let mut state = sample_state("s1");
        assert_ok!(db.put_state("a1", &state));
        assert_eq!(db.get_state("a1").unwrap(), Some(state.clone()));

        state.status = SessionStatus::IdleWarning;
        state.last_activity = 5_000;
        assert_ok!(db.put_state("a1", &state));
        let stored = db.get_state("a1").unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::IdleWarning);
        assert_eq!(stored.last_activity, 5_000);
    }

    #[test]
    fn test_single_alarm_per_actor() {
        let db = Database::open_in_memory().unwrap();
        db.put_state_and_alarm("a1", &sample_state("s1"), 400).unwrap();
        db.put_state_and_alarm("a1", &sample_state("s1"), 415).unwrap();
        db.put_state_and_alarm("a2", &sample_state("s2"), 100).unwrap();

        assert_eq!(db.get_alarm("a1").unwrap(), Some(415));
        let alarms = db.list_alarms().unwrap();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[0].actor_id, "a2");
        assert_eq!(alarms[1].fire_at, 415);

        db.delete_all("a1").unwrap();
        assert!(db.get_alarm("a1").unwrap().is_none());
    }

    #[test]
    fn test_failed_alarm_write_keeps_previous_state() {
        let db = Database::open_in_memory().unwrap();
        let before = sample_state("s1");
        db.put_state_and_alarm("a1", &before, 3_000).unwrap();

        db.break_alarms_for_tests();
        let mut after = before.clone();
        after.status = SessionStatus::Ended;
        after.last_activity = 9_000;

        assert!(matches!(
            db.put_state_and_alarm("a1", &after, 9_000),
            Err(Error::Database(_))
        ));
        assert_eq!(db.get_state("a1").unwrap(), Some(before));
    }

    #[test]
    fn test_delete_all_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.put_state_and_alarm("a1", &sample_state("s1"), 10).unwrap();

        db.delete_all("a1").unwrap();
        assert!(db.get_state("a1").unwrap().is_none());
        assert!(db.get_alarm("a1").unwrap().is_none());

        assert_ok!(db.delete_all("a1"));
        assert!(db.list_alarms().unwrap().is_empty());
    }

    #[test]
    fn test_count_sessions() {
        let db = Database::open_in_memory().unwrap();
        db.put_state("a1", &sample_state("s1")).unwrap();
        let mut warned = sample_state("s2");
        warned.status = SessionStatus::IdleWarning;
        db.put_state("a2", &warned).unwrap();
        let mut ended = sample_state("s3");
        ended.status = SessionStatus::Ended;
        db.put_state("a3", &ended).unwrap();

        let counts = db.count_sessions().unwrap();
        assert_eq!(counts.active, 1);
        assert_eq!(counts.idle_warning, 1);
        assert_eq!(counts.ended, 1);
        assert_eq!(counts.other, 0);
    }

    #[test]
    fn test_open_path_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        {
            let db = Database::open_path(&path).unwrap();
            db.put_state_and_alarm("a1", &sample_state("s1"), 3_000).unwrap();
        }

        let db = Database::open_path(&path).unwrap();
        assert_eq!(db.get_state("a1").unwrap().unwrap().session_id, "s1");
        assert_eq!(db.get_alarm("a1").unwrap(), Some(3_000));
        assert!(db.ping().is_ok());
    }

    #[test]
    fn test_broken_schema_surfaces_database_error() {
        let db = Database::open_in_memory().unwrap();
        db.break_for_tests();
        assert!(matches!(
            db.put_state("a1", &sample_state("s1")),
            Err(Error::Database(_))
        ));
    }
}
