use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerSnapshot;

/// Every timer transition produces an Event.
/// The CLI prints them; the ticker wraps snapshots in `Tick`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: String,
        started_at: DateTime<Utc>,
        /// An unterminated record for this user was picked up instead of
        /// creating a new one.
        adopted: bool,
        /// The record store was unreachable; the id is client-generated.
        offline: bool,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: String,
        break_secs: u64,
        total_break_secs: u64,
        at: DateTime<Utc>,
    },
    /// Session frozen and waiting for a productivity rating.
    FinishRequested {
        session_id: String,
        elapsed_secs: u64,
        total_break_secs: u64,
        at: DateTime<Utc>,
    },
    FinishCancelled {
        session_id: String,
        at: DateTime<Utc>,
    },
    SessionFinished {
        session_id: String,
        elapsed_secs: u64,
        total_break_secs: u64,
        productivity: u8,
        note: String,
        at: DateTime<Utc>,
    },
    SessionDiscarded {
        session_id: Option<String>,
        at: DateTime<Utc>,
    },
    Tick {
        snapshot: TimerSnapshot,
    },
}
