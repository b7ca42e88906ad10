//! Clock abstraction shared by the scheduler, the daemon and the logger.
//!
//! Production code reads the wall clock through `RealTimeSource`. Tests and the
//! `schedule --at` dry run install a `FixedTimeSource` whose time only moves when
//! told to, which makes "has this prayer already passed" decisions reproducible.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

/// Process-wide clock, defaults to `RealTimeSource` on first use.
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Block for `duration`, or advance a simulated clock by it.
    fn sleep(&self, duration: StdDuration);

    fn is_simulated(&self) -> bool;
}

pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Manually driven clock. `sleep` advances it instantly.
pub struct FixedTimeSource {
    current: Mutex<DateTime<Utc>>,
}

impl FixedTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut current) = self.current.lock() {
            *current = instant;
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn sleep(&self, duration: StdDuration) {
        let step = ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero());
        self.advance(step);
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Install the process-wide clock. Only the first call has an effect.
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

/// The process-wide clock as a shareable handle.
pub fn current() -> Arc<dyn TimeSource> {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .clone()
}

pub fn now() -> DateTime<Utc> {
    current().now()
}

pub fn sleep(duration: StdDuration) {
    current().sleep(duration)
}

pub fn is_simulated() -> bool {
    current().is_simulated()
}

/// Parse "YYYY-MM-DD HH:MM:SS" as wall-clock time in `tz`.
pub fn parse_datetime_in_tz<Z: TimeZone>(s: &str, tz: &Z) -> Result<DateTime<Z>, String> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{s}' does not exist in the selected time zone"))
}
