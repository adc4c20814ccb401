//! Clock collaborator (§6). The engine and time model never call the system
//! clock directly; everything that needs "now" takes a `&dyn Clock`.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current wall-clock time of day, unrounded. `time::get_current_time_rounded`
    /// is the rounded-to-5-minutes variant used for suggestions (§4.6).
    fn current_hhmm(&self) -> String {
        self.now().format("%H:%M").to_string()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test double returning a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
