//! Shared traits, calendar helpers, and enums for ledger primitives.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Exposes a stable identifier for stored entities.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Provides read-only access to an entity's display name.
pub trait NamedEntity {
    fn name(&self) -> &str;
}

/// Entities scoped to exactly one owning user.
pub trait Owned {
    fn user_id(&self) -> Uuid;
}

/// Direction of money relative to the owning account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Income,
    Expense,
}

impl FlowKind {
    /// Applies the balance sign for this kind: `+amount` for income, `-amount` for expense.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            FlowKind::Income => amount,
            FlowKind::Expense => -amount,
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlowKind::Income => "income",
            FlowKind::Expense => "expense",
        };
        f.write_str(label)
    }
}

/// Inclusive calendar range used for expansion and aggregation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Every date up to and including `end`.
    pub fn through(end: NaiveDate) -> Self {
        Self {
            start: NaiveDate::MIN,
            end,
        }
    }

    /// First day of `date`'s month through `date`.
    pub fn month_to_date(date: NaiveDate) -> Self {
        Self {
            start: date.with_day(1).unwrap_or(date),
            end: date,
        }
    }

    /// January 1st of `date`'s year through `date`.
    pub fn year_to_date(date: NaiveDate) -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered, counting both bounds.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Builds `year-month-day`, pulling `day` back to the month's last day when it overflows.
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month);
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

/// Moves `date` by `months`, clamping the day to the target month's length.
pub fn shift_month(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    clamped_date(year, month, date.day())
}

pub fn shift_year(date: NaiveDate, years: i32) -> Option<NaiveDate> {
    clamped_date(date.year() + years, date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn february_length_follows_leap_rules() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
    }

    #[test]
    fn clamped_date_pulls_overflow_to_month_end() {
        assert_eq!(clamped_date(2025, 2, 31), Some(date(2025, 2, 28)));
        assert_eq!(clamped_date(2025, 4, 31), Some(date(2025, 4, 30)));
        assert_eq!(clamped_date(2025, 13, 1), None);
    }

    #[test]
    fn shift_month_crosses_year_boundaries() {
        assert_eq!(shift_month(date(2025, 12, 15), 1), Some(date(2026, 1, 15)));
        assert_eq!(shift_month(date(2025, 1, 31), 1), Some(date(2025, 2, 28)));
        assert_eq!(shift_month(date(2025, 1, 10), -1), Some(date(2024, 12, 10)));
        assert_eq!(shift_year(date(2024, 2, 29), 1), Some(date(2025, 2, 28)));
    }

    #[test]
    fn window_rejects_inverted_range() {
        let err = DateWindow::new(date(2025, 3, 2), date(2025, 3, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidDateRange { .. }));
        let single = DateWindow::new(date(2025, 3, 1), date(2025, 3, 1)).unwrap();
        assert_eq!(single.days(), 1);
        assert!(single.contains(date(2025, 3, 1)));
    }

    #[test]
    fn flow_kind_signs_amounts() {
        let amount = Decimal::new(1500, 0);
        assert_eq!(FlowKind::Income.signed(amount), amount);
        assert_eq!(FlowKind::Expense.signed(amount), -amount);
    }
}
