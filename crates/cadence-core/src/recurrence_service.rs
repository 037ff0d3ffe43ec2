//! Answers "does this entry occur on date D".
//!
//! Month-end policy: a monthly `day` larger than the target month's length falls
//! on that month's last day, and a yearly rule anchored on Feb 29 falls on Feb 28
//! in non-leap years.

use chrono::{Datelike, Days, NaiveDate};

use cadence_domain::{clamped_date, days_in_month, Entry, Recurrence};

pub struct RecurrenceService;

impl RecurrenceService {
    /// True when `date` is inside the entry's bounds and matches its rule.
    /// The active flag is not consulted; schedule expansion handles it.
    pub fn occurs_on(entry: &Entry, date: NaiveDate) -> bool {
        entry.within_bounds(date) && Self::matches(&entry.recurrence, entry.start_date, date)
    }

    /// Rule match ignoring bounds. `anchor` is the entry start date.
    pub fn matches(rule: &Recurrence, anchor: NaiveDate, date: NaiveDate) -> bool {
        match rule {
            Recurrence::Daily => true,
            Recurrence::Weekly(days) => days.contains(date.weekday()),
            Recurrence::Monthly { day } => {
                date.day() == (*day).min(days_in_month(date.year(), date.month()))
            }
            Recurrence::Yearly => {
                date.month() == anchor.month()
                    && date.day() == anchor.day().min(days_in_month(date.year(), anchor.month()))
            }
        }
    }

    /// Earliest date `>= from` that matches `rule`, ignoring bounds.
    pub fn next_on_or_after(
        rule: &Recurrence,
        anchor: NaiveDate,
        from: NaiveDate,
    ) -> Option<NaiveDate> {
        match rule {
            Recurrence::Daily => Some(from),
            Recurrence::Weekly(days) => (0..7u64)
                .filter_map(|offset| from.checked_add_days(Days::new(offset)))
                .find(|candidate| days.contains(candidate.weekday())),
            Recurrence::Monthly { day } => {
                let this_month = clamped_date(from.year(), from.month(), *day)?;
                if this_month >= from {
                    return Some(this_month);
                }
                let (year, month) = if from.month() == 12 {
                    (from.year() + 1, 1)
                } else {
                    (from.year(), from.month() + 1)
                };
                clamped_date(year, month, *day)
            }
            Recurrence::Yearly => {
                let this_year = clamped_date(from.year(), anchor.month(), anchor.day())?;
                if this_year >= from {
                    return Some(this_year);
                }
                clamped_date(from.year() + 1, anchor.month(), anchor.day())
            }
        }
    }

    /// Next occurrence of `entry` on or after `from`, honouring its bounds.
    pub fn next_occurrence(entry: &Entry, from: NaiveDate) -> Option<NaiveDate> {
        let from = from.max(entry.start_date);
        let next = Self::next_on_or_after(&entry.recurrence, entry.start_date, from)?;
        entry.within_bounds(next).then_some(next)
    }
}
