//! Sleep and mood logs.
//!
//! Sleep is scored once per day (a second entry for the same day replaces
//! the first); mood entries are timestamped and append-only. Both sit next
//! to the study session records in the same database.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::optimistic::OptimisticCache;
use crate::remote::SessionRecord;
use crate::score::Score;
use crate::storage::database::{parse_ts, ts};
use crate::storage::Database;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepLog {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub score: Score,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodLog {
    pub id: i64,
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub score: Score,
    pub note: String,
}

/// Everything a user has logged, each list newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogBundle {
    pub study: Vec<SessionRecord>,
    pub sleep: Vec<SleepLog>,
    pub mood: Vec<MoodLog>,
}

fn score_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Score> {
    let raw: i64 = row.get(idx)?;
    Score::new(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

fn sleep_from_row(row: &Row<'_>) -> rusqlite::Result<SleepLog> {
    let date: String = row.get(2)?;
    Ok(SleepLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        score: score_from_row(row, 3)?,
        note: row.get(4)?,
    })
}

fn mood_from_row(row: &Row<'_>) -> rusqlite::Result<MoodLog> {
    let at: String = row.get(2)?;
    Ok(MoodLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        at: parse_ts(2, &at)?,
        score: score_from_row(row, 3)?,
        note: row.get(4)?,
    })
}

impl Database {
    /// Record tonight's sleep for `date`, replacing an earlier entry for the same day.
    pub fn upsert_sleep(
        &self,
        user_id: &str,
        date: NaiveDate,
        score: Score,
        note: &str,
    ) -> Result<SleepLog> {
        let date_str = date.format(DATE_FORMAT).to_string();
        self.conn().execute(
            "INSERT INTO sleep_logs (user_id, date, score, note) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, date) DO UPDATE SET score = excluded.score, note = excluded.note",
            params![user_id, date_str, score.get(), note],
        )?;
        let log = self.conn().query_row(
            "SELECT id, user_id, date, score, note FROM sleep_logs WHERE user_id = ?1 AND date = ?2",
            params![user_id, date_str],
            sleep_from_row,
        )?;
        Ok(log)
    }

    pub fn insert_mood(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
        score: Score,
        note: &str,
    ) -> Result<MoodLog> {
        self.conn().execute(
            "INSERT INTO mood_logs (user_id, at, score, note) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, ts(at), score.get(), note],
        )?;
        Ok(MoodLog {
            id: self.conn().last_insert_rowid(),
            user_id: user_id.to_string(),
            at,
            score,
            note: note.to_string(),
        })
    }

    pub fn sleep_logs(&self, user_id: &str) -> Result<Vec<SleepLog>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, date, score, note FROM sleep_logs
             WHERE user_id = ?1 ORDER BY date DESC",
        )?;
        let rows = stmt.query_map(params![user_id], sleep_from_row)?;
        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }
        Ok(logs)
    }

    pub fn mood_logs(&self, user_id: &str) -> Result<Vec<MoodLog>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, at, score, note FROM mood_logs
             WHERE user_id = ?1 ORDER BY at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], mood_from_row)?;
        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }
        Ok(logs)
    }

    pub fn all_logs(&self, user_id: &str) -> Result<LogBundle> {
        Ok(LogBundle {
            study: self.list_sessions(user_id)?,
            sleep: self.sleep_logs(user_id)?,
            mood: self.mood_logs(user_id)?,
        })
    }
}

/// A user's sleep and mood logs with optimistic writes.
///
/// New entries show up in the view before the insert runs and disappear
/// again if it fails.
pub struct LogBook<'a> {
    db: &'a Database,
    user_id: String,
    sleep: OptimisticCache<NaiveDate, SleepLog>,
    mood: OptimisticCache<DateTime<Utc>, MoodLog>,
}

impl<'a> LogBook<'a> {
    pub fn load(db: &'a Database, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        let sleep = db
            .sleep_logs(&user_id)?
            .into_iter()
            .map(|log| (log.date, log))
            .collect();
        let mood = db
            .mood_logs(&user_id)?
            .into_iter()
            .map(|log| (log.at, log))
            .collect();
        Ok(Self {
            db,
            user_id,
            sleep,
            mood,
        })
    }

    pub fn log_sleep(&mut self, date: NaiveDate, score: Score, note: &str) -> Result<SleepLog> {
        let draft = SleepLog {
            id: self.sleep.get(&date).map(|log| log.id).unwrap_or_default(),
            user_id: self.user_id.clone(),
            date,
            score,
            note: note.to_string(),
        };
        let (db, user_id) = (self.db, self.user_id.as_str());
        self.sleep
            .transact(date, draft, |_| db.upsert_sleep(user_id, date, score, note))
    }

    pub fn log_mood(&mut self, at: DateTime<Utc>, score: Score, note: &str) -> Result<MoodLog> {
        let draft = MoodLog {
            id: 0,
            user_id: self.user_id.clone(),
            at,
            score,
            note: note.to_string(),
        };
        let (db, user_id) = (self.db, self.user_id.as_str());
        self.mood
            .transact(at, draft, |_| db.insert_mood(user_id, at, score, note))
    }

    /// Sleep logs, newest day first.
    pub fn sleep(&self) -> Vec<&SleepLog> {
        let mut logs: Vec<_> = self.sleep.values().collect();
        logs.sort_by(|a, b| b.date.cmp(&a.date));
        logs
    }

    /// Mood logs, newest first.
    pub fn mood(&self) -> Vec<&MoodLog> {
        let mut logs: Vec<_> = self.mood.values().collect();
        logs.sort_by(|a, b| b.at.cmp(&a.at));
        logs
    }
}
