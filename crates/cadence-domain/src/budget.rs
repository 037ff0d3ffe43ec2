//! Spending targets over a set of categories.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{shift_month, shift_year, DateWindow, Identifiable, NamedEntity, Owned},
    error::DomainError,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    /// Start of the period following the one beginning at `start`.
    pub fn next_start(self, start: NaiveDate) -> NaiveDate {
        let next = match self {
            BudgetPeriod::Weekly => start.checked_add_signed(Duration::days(7)),
            BudgetPeriod::Monthly => shift_month(start, 1),
            BudgetPeriod::Yearly => shift_year(start, 1),
        };
        next.unwrap_or(NaiveDate::MAX)
    }

    /// Inclusive window of the period beginning at `start`.
    pub fn window_from(self, start: NaiveDate) -> DateWindow {
        let end = self.next_start(start).pred_opt().unwrap_or(start);
        DateWindow {
            start,
            end: end.max(start),
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Share of income earmarked for this budget, in `(0, 100]`.
    pub allocation_percentage: Decimal,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub category_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub period: BudgetPeriod,
    pub period_start: NaiveDate,
    #[serde(default = "Budget::default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        allocation_percentage: Decimal,
        target_amount: Decimal,
        category_ids: impl IntoIterator<Item = Uuid>,
        period: BudgetPeriod,
        period_start: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let budget = Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            allocation_percentage,
            target_amount,
            current_amount: Decimal::ZERO,
            category_ids: category_ids.into_iter().collect(),
            period,
            period_start,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        budget.validate()?;
        Ok(budget)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidName("budget name is empty".into()));
        }
        if self.allocation_percentage <= Decimal::ZERO
            || self.allocation_percentage > Decimal::ONE_HUNDRED
        {
            return Err(DomainError::InvalidBudget(format!(
                "allocation percentage {} is outside (0, 100]",
                self.allocation_percentage
            )));
        }
        if self.target_amount <= Decimal::ZERO {
            return Err(DomainError::InvalidBudget(format!(
                "target amount must be positive, got {}",
                self.target_amount
            )));
        }
        if self.current_amount < Decimal::ZERO {
            return Err(DomainError::InvalidBudget(format!(
                "current amount must not be negative, got {}",
                self.current_amount
            )));
        }
        if self.category_ids.is_empty() {
            return Err(DomainError::InvalidBudget(
                "budget must track at least one category".into(),
            ));
        }
        Ok(())
    }

    pub fn tracks(&self, category_id: Uuid) -> bool {
        self.category_ids.contains(&category_id)
    }

    pub fn current_window(&self) -> DateWindow {
        self.period.window_from(self.period_start)
    }

    fn default_active() -> bool {
        true
    }
}

impl Identifiable for Budget {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Budget {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Owned for Budget {
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

    #[test]
    fn period_windows_are_inclusive() {
        let monthly = BudgetPeriod::Monthly.window_from(date(2025, 2, 1));
        assert_eq!(monthly.end, date(2025, 2, 28));
        let weekly = BudgetPeriod::Weekly.window_from(date(2025, 3, 3));
        assert_eq!(weekly.end, date(2025, 3, 9));
        let yearly = BudgetPeriod::Yearly.window_from(date(2025, 1, 1));
        assert_eq!(yearly.end, date(2025, 12, 31));
    }

    #[test]
    fn validation_enforces_ranges() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let ok = Budget::new(
            user,
            "Food",
            Decimal::new(100, 0),
            Decimal::new(500, 0),
            [category],
            BudgetPeriod::Monthly,
            date(2025, 1, 1),
            now,
        );
        assert!(ok.is_ok());

        let too_large = Budget::new(
            user,
            "Food",
            Decimal::new(101, 0),
            Decimal::new(500, 0),
            [category],
            BudgetPeriod::Monthly,
            date(2025, 1, 1),
            now,
        );
        assert!(matches!(too_large, Err(DomainError::InvalidBudget(_))));

        let zero_target = Budget::new(
            user,
            "Food",
            Decimal::new(10, 0),
            Decimal::ZERO,
            [category],
            BudgetPeriod::Monthly,
            date(2025, 1, 1),
            now,
        );
        assert!(zero_target.is_err());
    }
}
