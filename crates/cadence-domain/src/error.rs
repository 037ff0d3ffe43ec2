use std::fmt;

use chrono::NaiveDate;

/// Invariant violations detected while constructing or validating domain records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    InvalidRecurrence(String),
    InvalidAmount(String),
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    InvalidTimezone(String),
    InvalidCurrency(String),
    InvalidBudget(String),
    InvalidName(String),
    AmountOverflow(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::InvalidRecurrence(reason) => write!(f, "invalid recurrence: {reason}"),
            DomainError::InvalidAmount(reason) => write!(f, "invalid amount: {reason}"),
            DomainError::InvalidDateRange { start, end } => {
                write!(f, "end date {end} precedes start date {start}")
            }
            DomainError::InvalidTimezone(zone) => write!(f, "unknown IANA timezone `{zone}`"),
            DomainError::InvalidCurrency(code) => {
                write!(f, "`{code}` is not an ISO 4217 currency code")
            }
            DomainError::InvalidBudget(reason) => write!(f, "invalid budget: {reason}"),
            DomainError::InvalidName(reason) => write!(f, "invalid name: {reason}"),
            DomainError::AmountOverflow(what) => write!(f, "amount overflow: {what}"),
        }
    }
}

impl std::error::Error for DomainError {}
