use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use cadence_domain::User;

use crate::CoreError;

/// Clock abstracts access to the current timestamp so services remain deterministic in tests.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current UTC date. Defaults to `now().date_naive()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Returns the calendar date currently observed in `tz`.
    fn today_in(&self, tz: Tz) -> NaiveDate {
        tz.from_utc_datetime(&self.now().naive_utc()).date_naive()
    }
}

/// Real-time clock backed by the system UTC time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Midday UTC on the given date, or `None` for an impossible date.
    pub fn on(year: i32, month: u32, day: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// "Today" for `user`, evaluated in the user's configured zone.
pub fn user_today(clock: &dyn Clock, user: &User) -> Result<NaiveDate, CoreError> {
    Ok(clock.today_in(user.tz()?))
}
