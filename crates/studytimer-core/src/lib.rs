//! # Study Timer Core Library
//!
//! Core logic for the study-session timer. Everything is reachable from the
//! standalone CLI binary; any other front end is a thin layer over the same
//! library.
//!
//! ## Architecture
//!
//! - **Timer**: a pure wall-clock state machine ([`StudyTimer`]) driven by an
//!   async [`TimerController`] that persists state, ticks once a second while
//!   running, and keeps the session record store up to date
//! - **Remote**: the [`SessionRecordStore`] trait with a local SQLite backend
//!   and an HTTP (PostgREST) backend
//! - **Storage**: SQLite database, key-value persistence and TOML configuration
//! - **Logs**: daily sleep scores and timestamped mood entries
//!
//! ## Key Components
//!
//! - [`TimerController`]: start / pause / resume / finish / discard
//! - [`Database`]: sessions, logs and timer state
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod identity;
pub mod logs;
pub mod optimistic;
pub mod remote;
pub mod score;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, RemoteError, Result, ValidationError};
pub use events::Event;
pub use identity::{IdentityProvider, StaticIdentity};
pub use logs::{LogBook, LogBundle, MoodLog, SleepLog};
pub use optimistic::OptimisticCache;
pub use remote::{Finalization, SessionRecord, SessionRecordStore};
pub use score::Score;
pub use storage::{Config, Database, KvStore, MemoryKv, PersistExt};
pub use timer::{
    format_clock, format_hms, ControllerOptions, SessionState, StudyTimer, TimerController,
    TimerSnapshot, TimerStatus,
};
