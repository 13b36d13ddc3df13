use chrono::{Datelike, Local, Weekday};

/// Wall clock used for trigger times and the day filter.
pub trait Clock: Send + Sync {
    /// Unix epoch millis
    fn now_ms(&self) -> i64;

    /// Current local day of week
    fn today(&self) -> Weekday;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Local::now().timestamp_millis()
    }

    fn today(&self) -> Weekday {
        Local::now().weekday()
    }
}
