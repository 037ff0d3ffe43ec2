//! Recurring income/expense templates.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{FlowKind, Identifiable, NamedEntity, Owned},
    error::DomainError,
    recurrence::Recurrence,
};

/// A recurrence template that produces transactions on its occurrence dates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub kind: FlowKind,
    pub amount: Decimal,
    pub recurrence: Recurrence,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        account_id: Uuid,
        category_id: Uuid,
        name: impl Into<String>,
        kind: FlowKind,
        amount: Decimal,
        recurrence: Recurrence,
        start_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let entry = Self {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            category_id,
            name: name.into(),
            kind,
            amount,
            recurrence,
            start_date,
            end_date: None,
            is_active: true,
            routine_id: None,
            note: None,
            created_at: now,
            updated_at: now,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Bounds the schedule; `end_date` is inclusive.
    pub fn with_end_date(mut self, end_date: NaiveDate) -> Result<Self, DomainError> {
        self.end_date = Some(end_date);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidName("entry name is empty".into()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "entry amount must be positive, got {}",
                self.amount
            )));
        }
        self.recurrence.validate()?;
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(DomainError::InvalidDateRange {
                    start: self.start_date,
                    end,
                });
            }
        }
        Ok(())
    }

    /// Whether `date` lies inside `[start_date, end_date]`.
    pub fn within_bounds(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }

    /// Balance effect of one occurrence.
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

impl Identifiable for Entry {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Entry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Owned for Entry {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rent() -> Entry {
        Entry::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Rent",
            FlowKind::Expense,
            Decimal::new(1500, 0),
            Recurrence::monthly(1).unwrap(),
            date(2025, 1, 1),
            Utc::now(),
        )
        .expect("valid entry")
    }

    #[test]
    fn rejects_non_positive_amount() {
        let result = Entry::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Nothing",
            FlowKind::Income,
            Decimal::ZERO,
            Recurrence::Daily,
            date(2025, 1, 1),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
    }

    #[test]
    fn end_date_must_not_precede_start() {
        assert!(rent().with_end_date(date(2024, 12, 31)).is_err());
        let bounded = rent().with_end_date(date(2025, 1, 1)).unwrap();
        assert!(bounded.within_bounds(date(2025, 1, 1)));
        assert!(!bounded.within_bounds(date(2025, 1, 2)));
    }

    #[test]
    fn directly_built_recurrence_is_validated() {
        let mut entry = rent();
        entry.recurrence = Recurrence::Monthly { day: 40 };
        assert!(matches!(entry.validate(), Err(DomainError::InvalidRecurrence(_))));
    }

    #[test]
    fn deserialization_rejects_malformed_recurrence() {
        let mut value = serde_json::to_value(rent()).unwrap();
        value["recurrence"] = serde_json::json!({"frequency": "weekly"});
        assert!(serde_json::from_value::<Entry>(value).is_err());
    }
}
