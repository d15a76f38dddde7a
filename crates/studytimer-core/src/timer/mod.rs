mod controller;
mod display;
mod machine;
mod state;

pub use controller::{ControllerOptions, TimerController, DEFAULT_TICK_INTERVAL, STATE_KEY};
pub use display::{format_clock, format_hms};
pub use machine::{FinishedSession, SessionOrigin, StudyTimer, TimerSnapshot};
pub use state::{active_secs, PausedSession, PersistedState, RunningSession, SessionState, TimerStatus};
