//! Session state and its persisted form.

use serde::{Deserialize, Serialize};

use crate::clock::secs_since;

/// Coarse status of the timer, used in snapshots and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningSession {
    pub id: String,
    pub start_epoch_ms: u64,
    /// Break seconds already accounted for.
    pub break_acc_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PausedSession {
    pub id: String,
    pub start_epoch_ms: u64,
    pub break_acc_secs: u64,
    pub break_start_epoch_ms: u64,
    /// Active seconds frozen at the moment of pausing.
    pub paused_elapsed_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running(RunningSession),
    Paused(PausedSession),
}

impl SessionState {
    pub fn status(&self) -> TimerStatus {
        match self {
            SessionState::Idle => TimerStatus::Idle,
            SessionState::Running(_) => TimerStatus::Running,
            SessionState::Paused(_) => TimerStatus::Paused,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::Running(s) => Some(&s.id),
            SessionState::Paused(s) => Some(&s.id),
        }
    }

    pub fn start_epoch_ms(&self) -> Option<u64> {
        match self {
            SessionState::Idle => None,
            SessionState::Running(s) => Some(s.start_epoch_ms),
            SessionState::Paused(s) => Some(s.start_epoch_ms),
        }
    }

    pub fn break_acc_secs(&self) -> u64 {
        match self {
            SessionState::Idle => 0,
            SessionState::Running(s) => s.break_acc_secs,
            SessionState::Paused(s) => s.break_acc_secs,
        }
    }
}

/// Active seconds for a session that started at `start_ms`.
pub fn active_secs(start_ms: u64, break_acc_secs: u64, now_ms: u64) -> u64 {
    secs_since(start_ms, now_ms).saturating_sub(break_acc_secs)
}

/// On-disk shape of [`SessionState`].
///
/// Field names follow the format written by earlier versions of the app.
/// `pausedElapsed` was added later, so it is optional on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PersistedState {
    Idle,
    Running {
        id: String,
        start: u64,
        #[serde(rename = "breakAcc", default)]
        break_acc: u64,
    },
    Paused {
        id: String,
        start: u64,
        #[serde(rename = "breakAcc", default)]
        break_acc: u64,
        #[serde(rename = "breakStart")]
        break_start: u64,
        #[serde(rename = "pausedElapsed", default, skip_serializing_if = "Option::is_none")]
        paused_elapsed: Option<u64>,
    },
}

impl From<&SessionState> for PersistedState {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Idle => PersistedState::Idle,
            SessionState::Running(s) => PersistedState::Running {
                id: s.id.clone(),
                start: s.start_epoch_ms,
                break_acc: s.break_acc_secs,
            },
            SessionState::Paused(s) => PersistedState::Paused {
                id: s.id.clone(),
                start: s.start_epoch_ms,
                break_acc: s.break_acc_secs,
                break_start: s.break_start_epoch_ms,
                paused_elapsed: Some(s.paused_elapsed_secs),
            },
        }
    }
}

impl PersistedState {
    /// Rebuild the in-memory state at load time.
    ///
    /// A paused value without `pausedElapsed` has it recomputed from
    /// `start` and `breakAcc` against `now_ms`.
    pub fn rehydrate(self, now_ms: u64) -> SessionState {
        match self {
            PersistedState::Idle => SessionState::Idle,
            PersistedState::Running {
                id,
                start,
                break_acc,
            } => SessionState::Running(RunningSession {
                id,
                start_epoch_ms: start,
                break_acc_secs: break_acc,
            }),
            PersistedState::Paused {
                id,
                start,
                break_acc,
                break_start,
                paused_elapsed,
            } => {
                let paused_elapsed_secs = match paused_elapsed {
                    Some(secs) => secs,
                    None => {
                        tracing::debug!(session = %id, "recomputing paused elapsed for legacy state");
                        active_secs(start, break_acc, now_ms)
                    }
                };
                SessionState::Paused(PausedSession {
                    id,
                    start_epoch_ms: start,
                    break_acc_secs: break_acc,
                    break_start_epoch_ms: break_start,
                    paused_elapsed_secs,
                })
            }
        }
    }
}
