//! Database schema migrations for studytimer.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: key-value state and study session records.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS study_sessions (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            started_at       TEXT NOT NULL,
            ended_at         TEXT,
            total_break_secs INTEGER NOT NULL DEFAULT 0,
            productivity     INTEGER,
            note             TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_study_sessions_user_started
            ON study_sessions(user_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_study_sessions_user_ended
            ON study_sessions(user_id, ended_at);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: sleep and mood logs.
///
/// Sleep logs are unique per user and calendar day; mood logs are
/// append-only.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sleep_logs (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            date    TEXT NOT NULL,
            score   INTEGER NOT NULL,
            note    TEXT NOT NULL DEFAULT '',
            UNIQUE(user_id, date)
        );

        CREATE TABLE IF NOT EXISTS mood_logs (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            at      TEXT NOT NULL,
            score   INTEGER NOT NULL,
            note    TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_mood_logs_user_at ON mood_logs(user_id, at);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
