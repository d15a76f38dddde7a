//! SQLite storage.
//!
//! Provides persistent storage for:
//! - Study session records (the local record store backend)
//! - Sleep and mood logs (see [`crate::logs`])
//! - Key-value store for timer state

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use super::{data_dir, migrations, KvStore};
use crate::error::{DatabaseError, Result};
use crate::remote::{Finalization, SessionRecord};

/// SQLite database shared by the record store, the logs and the kv store.
pub struct Database {
    conn: Connection,
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let started_at: String = row.get(2)?;
    let ended_at: Option<String> = row.get(3)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        started_at: parse_ts(2, &started_at)?,
        ended_at: ended_at.as_deref().map(|s| parse_ts(3, s)).transpose()?,
        total_break_secs: row.get(4)?,
        productivity: row.get(5)?,
        note: row.get(6)?,
    })
}

const SESSION_COLUMNS: &str =
    "id, user_id, started_at, ended_at, total_break_secs, productivity, note";

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/studytimer/studytimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("studytimer.db"))
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Study sessions ───────────────────────────────────────────────

    pub fn insert_session(&self, record: &SessionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO study_sessions (id, user_id, started_at, ended_at, total_break_secs, productivity, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.user_id,
                ts(record.started_at),
                record.ended_at.map(ts),
                record.total_break_secs,
                record.productivity,
                record.note,
            ],
        )?;
        Ok(())
    }

    pub fn find_active_session(&self, user_id: &str) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM study_sessions
             WHERE user_id = ?1 AND ended_at IS NULL
             ORDER BY started_at DESC
             LIMIT 1"
        );
        let record = self
            .conn
            .query_row(&sql, params![user_id], session_from_row)
            .optional()?;
        Ok(record)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM study_sessions WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![id], session_from_row)
            .optional()?;
        Ok(record)
    }

    /// Returns whether a row was updated.
    pub fn update_break(&self, id: &str, total_break_secs: u64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE study_sessions SET total_break_secs = ?2 WHERE id = ?1",
            params![id, total_break_secs],
        )?;
        Ok(changed > 0)
    }

    /// Returns whether a row was updated.
    pub fn finalize_session(&self, id: &str, finalization: &Finalization) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE study_sessions SET ended_at = ?2, productivity = ?3, note = ?4 WHERE id = ?1",
            params![
                id,
                ts(finalization.ended_at),
                finalization.productivity.get(),
                finalization.note,
            ],
        )?;
        Ok(changed > 0)
    }

    /// All sessions for a user, newest first.
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM study_sessions
             WHERE user_id = ?1
             ORDER BY started_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], session_from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }
}

impl KvStore for Database {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Score;
    use chrono::Duration;

    fn record(id: &str, user: &str, started_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            user_id: user.into(),
            started_at,
            ended_at: None,
            total_break_secs: 0,
            productivity: None,
            note: None,
        }
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn find_active_returns_latest_open_session() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.insert_session(&record("old", "u1", now - Duration::hours(2)))
            .unwrap();
        db.insert_session(&record("new", "u1", now - Duration::hours(1)))
            .unwrap();
        db.insert_session(&record("other", "u2", now)).unwrap();

        let active = db.find_active_session("u1").unwrap().unwrap();
        assert_eq!(active.id, "new");

        db.finalize_session(
            "new",
            &Finalization {
                productivity: Score::new(6).unwrap(),
                note: String::new(),
                ended_at: now,
            },
        )
        .unwrap();
        assert_eq!(db.find_active_session("u1").unwrap().unwrap().id, "old");
    }

    #[test]
    fn finalize_and_patch_update_row() {
        let db = Database::open_memory().unwrap();
        let start = Utc::now() - Duration::minutes(30);
        db.insert_session(&record("s", "u", start)).unwrap();

        assert!(db.update_break("s", 120).unwrap());
        assert!(!db.update_break("missing", 1).unwrap());
        db.finalize_session(
            "s",
            &Finalization {
                productivity: Score::new(9).unwrap(),
                note: "deep work".into(),
                ended_at: start + Duration::minutes(30),
            },
        )
        .unwrap();

        let row = db.get_session("s").unwrap().unwrap();
        assert_eq!(row.total_break_secs, 120);
        assert_eq!(row.productivity, Some(9));
        assert_eq!(row.note.as_deref(), Some("deep work"));
        assert!(!row.is_active());
        assert_eq!(
            row.started_at.timestamp_millis(),
            start.timestamp_millis()
        );
    }

    #[test]
    fn list_sessions_newest_first() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            db.insert_session(&record(id, "u", now + Duration::minutes(i as i64)))
                .unwrap();
        }
        let ids: Vec<_> = db
            .list_sessions("u")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("k", "v").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
