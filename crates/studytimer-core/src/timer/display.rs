use std::fmt;

use super::machine::TimerSnapshot;
use super::state::TimerStatus;

/// `HH:MM:SS`, zero padded. Hours are not wrapped.
pub fn format_clock(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// `1h 2m 3s`, used in the finish summary.
pub fn format_hms(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h}h {m}m {s}s")
}

impl fmt::Display for TimerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_clock(self.elapsed_secs))?;
        match self.status {
            TimerStatus::Idle => write!(f, "  idle"),
            TimerStatus::Running => write!(f, "  running"),
            TimerStatus::Paused => {
                write!(f, "  paused  break {:02}s", self.break_secs)?;
                if self.finishing {
                    write!(f, "  (finishing)")?;
                }
                Ok(())
            }
        }
    }
}
