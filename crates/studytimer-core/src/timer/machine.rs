//! Study session state machine.
//!
//! A pure reducer over [`SessionState`]. It never reads the clock or
//! touches storage; every command takes the current epoch milliseconds
//! and the caller ([`super::TimerController`]) handles persistence,
//! record-store calls and ticking.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> Idle
//!           \___________________^   (finish / discard)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{active_secs, PausedSession, RunningSession, SessionState, TimerStatus};
use crate::clock::{secs_since, to_utc};
use crate::events::Event;
use crate::score::Score;

/// Where the id of a newly started session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// A new record was created in the record store.
    Created,
    /// An unterminated record for the same user was picked up.
    Adopted,
    /// The record store was unreachable; the id is client-generated.
    Offline,
}

/// Point-in-time view of the timer for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Active (non-break) seconds; frozen while paused.
    pub elapsed_secs: u64,
    /// Seconds into the current break; 0 unless paused.
    pub break_secs: u64,
    /// Accounted break seconds plus the current break.
    pub total_break_secs: u64,
    /// The finish prompt is open.
    pub finishing: bool,
    pub at: DateTime<Utc>,
}

/// What `finish` hands back for finalising the session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedSession {
    pub id: String,
    pub elapsed_secs: u64,
    pub total_break_secs: u64,
    pub productivity: Score,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct StudyTimer {
    state: SessionState,
    finishing: bool,
}

impl StudyTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a rehydrated state. The finish prompt is never restored.
    pub fn from_state(state: SessionState) -> Self {
        Self {
            state,
            finishing: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status()
    }

    pub fn is_finishing(&self) -> bool {
        self.finishing
    }

    pub fn elapsed_secs(&self, now_ms: u64) -> u64 {
        match &self.state {
            SessionState::Idle => 0,
            SessionState::Running(s) => active_secs(s.start_epoch_ms, s.break_acc_secs, now_ms),
            SessionState::Paused(s) => s.paused_elapsed_secs,
        }
    }

    pub fn break_secs(&self, now_ms: u64) -> u64 {
        match &self.state {
            SessionState::Paused(s) => secs_since(s.break_start_epoch_ms, now_ms),
            _ => 0,
        }
    }

    pub fn total_break_secs(&self, now_ms: u64) -> u64 {
        self.state
            .break_acc_secs()
            .saturating_add(self.break_secs(now_ms))
    }

    pub fn snapshot(&self, now_ms: u64) -> TimerSnapshot {
        TimerSnapshot {
            status: self.status(),
            session_id: self.state.session_id().map(str::to_owned),
            started_at: self.state.start_epoch_ms().map(to_utc),
            elapsed_secs: self.elapsed_secs(now_ms),
            break_secs: self.break_secs(now_ms),
            total_break_secs: self.total_break_secs(now_ms),
            finishing: self.finishing,
            at: to_utc(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session. Ignored unless idle.
    pub fn start(
        &mut self,
        id: String,
        start_epoch_ms: u64,
        break_acc_secs: u64,
        origin: SessionOrigin,
        now_ms: u64,
    ) -> Option<Event> {
        if self.state.is_active() {
            return None;
        }
        self.state = SessionState::Running(RunningSession {
            id: id.clone(),
            start_epoch_ms,
            break_acc_secs,
        });
        self.finishing = false;
        Some(Event::SessionStarted {
            session_id: id,
            started_at: to_utc(start_epoch_ms),
            adopted: origin == SessionOrigin::Adopted,
            offline: origin == SessionOrigin::Offline,
            at: to_utc(now_ms),
        })
    }

    pub fn pause(&mut self, now_ms: u64) -> Option<Event> {
        let SessionState::Running(running) = &self.state else {
            return None;
        };
        let paused_elapsed_secs =
            active_secs(running.start_epoch_ms, running.break_acc_secs, now_ms);
        let paused = PausedSession {
            id: running.id.clone(),
            start_epoch_ms: running.start_epoch_ms,
            break_acc_secs: running.break_acc_secs,
            break_start_epoch_ms: now_ms,
            paused_elapsed_secs,
        };
        let session_id = paused.id.clone();
        self.state = SessionState::Paused(paused);
        Some(Event::SessionPaused {
            session_id,
            elapsed_secs: paused_elapsed_secs,
            at: to_utc(now_ms),
        })
    }

    pub fn resume(&mut self, now_ms: u64) -> Option<Event> {
        let SessionState::Paused(paused) = &self.state else {
            return None;
        };
        let break_secs = secs_since(paused.break_start_epoch_ms, now_ms);
        let running = RunningSession {
            id: paused.id.clone(),
            start_epoch_ms: paused.start_epoch_ms,
            break_acc_secs: paused.break_acc_secs.saturating_add(break_secs),
        };
        let event = Event::SessionResumed {
            session_id: running.id.clone(),
            break_secs,
            total_break_secs: running.break_acc_secs,
            at: to_utc(now_ms),
        };
        self.state = SessionState::Running(running);
        self.finishing = false;
        Some(event)
    }

    /// Freeze the session and open the finish prompt.
    ///
    /// An already paused session keeps its original break start.
    pub fn begin_finish(&mut self, now_ms: u64) -> Option<Event> {
        if !self.state.is_active() {
            return None;
        }
        self.pause(now_ms);
        self.finishing = true;
        let session_id = self.state.session_id()?.to_owned();
        Some(Event::FinishRequested {
            session_id,
            elapsed_secs: self.elapsed_secs(now_ms),
            total_break_secs: self.total_break_secs(now_ms),
            at: to_utc(now_ms),
        })
    }

    /// Close the finish prompt. The session stays paused.
    pub fn cancel_finish(&mut self, now_ms: u64) -> Option<Event> {
        if !self.finishing {
            return None;
        }
        self.finishing = false;
        let session_id = self.state.session_id()?.to_owned();
        Some(Event::FinishCancelled {
            session_id,
            at: to_utc(now_ms),
        })
    }

    /// End the session with a rating and reset to idle.
    ///
    /// A running session is paused first, so the final break total covers
    /// everything up to `now_ms`.
    pub fn finish(
        &mut self,
        productivity: Score,
        note: String,
        now_ms: u64,
    ) -> Option<(FinishedSession, Event)> {
        if !self.state.is_active() {
            return None;
        }
        self.pause(now_ms);
        let id = self.state.session_id()?.to_owned();
        let finished = FinishedSession {
            id: id.clone(),
            elapsed_secs: self.elapsed_secs(now_ms),
            total_break_secs: self.total_break_secs(now_ms),
            productivity,
            note: note.clone(),
        };
        self.reset();
        let event = Event::SessionFinished {
            session_id: id,
            elapsed_secs: finished.elapsed_secs,
            total_break_secs: finished.total_break_secs,
            productivity: productivity.get(),
            note,
            at: to_utc(now_ms),
        };
        Some((finished, event))
    }

    /// Abandon whatever is in progress.
    pub fn discard(&mut self, now_ms: u64) -> Event {
        let session_id = self.state.session_id().map(str::to_owned);
        self.reset();
        Event::SessionDiscarded {
            session_id,
            at: to_utc(now_ms),
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.finishing = false;
    }
}
