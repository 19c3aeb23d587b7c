use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};

/// Time source for scheduling decisions.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the hour of day (0..=23) in the process-local time zone.
    fn local_hour(&self) -> u32;

    /// Returns the calendar date in the process-local time zone.
    fn local_date(&self) -> NaiveDate;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_hour(&self) -> u32 {
        Local::now().hour()
    }

    fn local_date(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
