//! Lazy expansion of an entry's schedule over a date window.

use std::iter::FusedIterator;

use chrono::NaiveDate;

use cadence_domain::{DateWindow, Entry, Recurrence};

use crate::recurrence_service::RecurrenceService;

/// Ascending occurrence dates of one entry inside a closed window.
///
/// Cloning yields an independent iterator positioned at the same date, so a
/// caller can restart expansion without touching the entry again.
#[derive(Debug, Clone)]
pub struct Occurrences {
    recurrence: Recurrence,
    anchor: NaiveDate,
    cursor: Option<NaiveDate>,
    end: NaiveDate,
}

impl Occurrences {
    fn empty(anchor: NaiveDate) -> Self {
        Self {
            recurrence: Recurrence::Daily,
            anchor,
            cursor: None,
            end: anchor,
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let from = self.cursor?;
        let found = RecurrenceService::next_on_or_after(&self.recurrence, self.anchor, from)
            .filter(|date| *date <= self.end);
        self.cursor = found.and_then(|date| date.succ_opt());
        found
    }
}

impl FusedIterator for Occurrences {}

pub struct ScheduleService;

impl ScheduleService {
    /// Occurrences of an active entry within `[window_start, window_end]`,
    /// clipped to the entry's own bounds. Inactive entries and empty
    /// intersections yield nothing.
    pub fn expand(entry: &Entry, window_start: NaiveDate, window_end: NaiveDate) -> Occurrences {
        if !entry.is_active {
            return Occurrences::empty(entry.start_date);
        }
        Self::project(entry, window_start, window_end)
    }

    pub fn expand_window(entry: &Entry, window: DateWindow) -> Occurrences {
        Self::expand(entry, window.start, window.end)
    }

    /// Same as [`ScheduleService::expand`] but ignores the active flag, for previews.
    pub fn project(entry: &Entry, window_start: NaiveDate, window_end: NaiveDate) -> Occurrences {
        let lower = window_start.max(entry.start_date);
        let upper = entry
            .end_date
            .map_or(window_end, |end| end.min(window_end));
        if lower > upper {
            return Occurrences::empty(entry.start_date);
        }
        Occurrences {
            recurrence: entry.recurrence.clone(),
            anchor: entry.start_date,
            cursor: Some(lower),
            end: upper,
        }
    }

    pub fn count_in_window(entry: &Entry, window: DateWindow) -> usize {
        Self::expand_window(entry, window).count()
    }

    /// Next date on or after `today` on which an active entry is due.
    pub fn next_due(entry: &Entry, today: NaiveDate) -> Option<NaiveDate> {
        if !entry.is_active {
            return None;
        }
        RecurrenceService::next_occurrence(entry, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain::FlowKind;
    use chrono::{Datelike, Utc, Weekday};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(rule: Recurrence, start: NaiveDate) -> Entry {
        Entry::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Gym",
            FlowKind::Expense,
            Decimal::new(45, 0),
            rule,
            start,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn weekly_monday_over_four_weeks_yields_four_mondays() {
        let e = entry(Recurrence::weekly([Weekday::Mon]).unwrap(), date(2024, 1, 1));
        for offset in 0..7 {
            let start = date(2025, 3, 1) + chrono::Duration::days(offset);
            let end = start + chrono::Duration::days(27);
            let dates: Vec<_> = ScheduleService::expand(&e, start, end).collect();
            assert_eq!(dates.len(), 4, "window starting {start}");
            assert!(dates.iter().all(|d| d.weekday() == Weekday::Mon));
        }
    }

    #[test]
    fn monthly_31_over_february_yields_the_last_day() {
        let e = entry(Recurrence::monthly(31).unwrap(), date(2025, 1, 1));
        let dates: Vec<_> = ScheduleService::expand(&e, date(2025, 2, 1), date(2025, 2, 28)).collect();
        assert_eq!(dates, vec![date(2025, 2, 28)]);
    }

    #[test]
    fn expansion_is_clipped_to_entry_bounds() {
        let e = entry(Recurrence::Daily, date(2025, 1, 10))
            .with_end_date(date(2025, 1, 14))
            .unwrap();
        let dates: Vec<_> = ScheduleService::expand(&e, date(2025, 1, 1), date(2025, 1, 31)).collect();
        assert_eq!(dates.first(), Some(&date(2025, 1, 10)));
        assert_eq!(dates.last(), Some(&date(2025, 1, 14)));
        assert_eq!(dates.len(), 5);
        assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn inactive_and_disjoint_windows_are_empty() {
        let mut e = entry(Recurrence::Daily, date(2025, 1, 10));
        assert_eq!(
            ScheduleService::expand(&e, date(2024, 1, 1), date(2025, 1, 9)).count(),
            0
        );
        e.is_active = false;
        assert_eq!(
            ScheduleService::expand(&e, date(2025, 1, 1), date(2025, 12, 31)).count(),
            0
        );
        assert_eq!(
            ScheduleService::project(&e, date(2025, 1, 10), date(2025, 1, 11)).count(),
            2
        );
        assert_eq!(ScheduleService::next_due(&e, date(2025, 2, 1)), None);
    }

    #[test]
    fn clones_restart_independently() {
        let e = entry(Recurrence::monthly(15).unwrap(), date(2025, 1, 1));
        let mut first = ScheduleService::expand(&e, date(2025, 1, 1), date(2025, 6, 30));
        assert_eq!(first.next(), Some(date(2025, 1, 15)));
        let rest: Vec<_> = first.clone().collect();
        assert_eq!(rest.len(), 5);
        assert_eq!(first.next(), Some(date(2025, 2, 15)));
    }

    #[test]
    fn yearly_rule_spans_years() {
        let e = entry(Recurrence::Yearly, date(2024, 2, 29));
        let window = DateWindow::new(date(2024, 1, 1), date(2028, 12, 31)).unwrap();
        let dates: Vec<_> = ScheduleService::expand_window(&e, window).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 2, 29),
                date(2025, 2, 28),
                date(2026, 2, 28),
                date(2027, 2, 28),
                date(2028, 2, 29),
            ]
        );
        assert_eq!(ScheduleService::next_due(&e, date(2025, 3, 1)), Some(date(2026, 2, 28)));
    }
}
