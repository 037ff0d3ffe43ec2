//! Spending accumulation and limit checks for budgets.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use cadence_domain::{Budget, DomainError, Transaction};

use crate::CoreError;

/// Read-only view of where a budget stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetStatus {
    pub budget_id: Uuid,
    pub current_amount: Decimal,
    pub target_amount: Decimal,
    pub remaining_amount: Decimal,
    pub spent_percentage: Decimal,
    pub is_exceeded: bool,
    pub is_near_limit: bool,
}

pub struct BudgetService;

impl BudgetService {
    /// Counts `txn` against `budget` when it falls in a tracked category and
    /// in the current period. Returns whether the amount was added.
    pub fn apply_transaction(
        budget: &mut Budget,
        txn: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        if txn.user_id != budget.user_id {
            return Err(CoreError::OwnershipViolation(format!(
                "transaction {} belongs to user {}, budget {} to user {}",
                txn.id, txn.user_id, budget.id, budget.user_id
            )));
        }
        if !Self::counts(budget, txn) {
            return Ok(false);
        }
        budget.current_amount = budget
            .current_amount
            .checked_add(txn.amount)
            .ok_or_else(|| overflow(budget))?;
        budget.updated_at = now;
        Ok(true)
    }

    /// `current / target * 100`, zero for a zero target. Ratios too large to
    /// represent saturate at `Decimal::MAX`.
    pub fn spent_percentage(budget: &Budget) -> Decimal {
        if budget.target_amount.is_zero() {
            return Decimal::ZERO;
        }
        budget
            .current_amount
            .checked_div(budget.target_amount)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::MAX)
    }

    pub fn is_exceeded(budget: &Budget) -> bool {
        budget.current_amount > budget.target_amount
    }

    pub fn is_near_limit(budget: &Budget, threshold_percent: Decimal) -> bool {
        Self::spent_percentage(budget) >= threshold_percent
    }

    pub fn remaining_amount(budget: &Budget) -> Decimal {
        (budget.target_amount - budget.current_amount).max(Decimal::ZERO)
    }

    /// Takes `amount` back out of the accumulator, never going below zero.
    pub fn release_spending(budget: &mut Budget, amount: Decimal, now: DateTime<Utc>) {
        budget.current_amount = budget
            .current_amount
            .saturating_sub(amount)
            .max(Decimal::ZERO);
        budget.updated_at = now;
    }

    /// Starts a new period at `next_period_start`. Only the accumulator is cleared.
    pub fn reset_spending(budget: &mut Budget, next_period_start: NaiveDate, now: DateTime<Utc>) {
        budget.current_amount = Decimal::ZERO;
        budget.period_start = next_period_start;
        budget.updated_at = now;
    }

    /// Advances through every period that ended before `today`, resetting once
    /// if any boundary was crossed. Returns the number of periods skipped.
    pub fn roll_forward(budget: &mut Budget, today: NaiveDate, now: DateTime<Utc>) -> u32 {
        let mut start = budget.period_start;
        let mut crossed = 0;
        while budget.period.window_from(start).end < today {
            let next = budget.period.next_start(start);
            if next <= start {
                break;
            }
            start = next;
            crossed += 1;
        }
        if crossed > 0 {
            Self::reset_spending(budget, start, now);
        }
        crossed
    }

    /// Recomputes the accumulator from ledger history for the current period.
    pub fn reconcile(
        budget: &mut Budget,
        transactions: &[Transaction],
        now: DateTime<Utc>,
    ) -> Result<Decimal, CoreError> {
        let total = transactions
            .iter()
            .filter(|txn| txn.user_id == budget.user_id && Self::counts(budget, txn))
            .try_fold(Decimal::ZERO, |sum, txn| sum.checked_add(txn.amount))
            .ok_or_else(|| overflow(budget))?;
        if total != budget.current_amount {
            budget.current_amount = total;
            budget.updated_at = now;
        }
        Ok(total)
    }

    /// Share of `total_income` earmarked by the budget's allocation percentage.
    pub fn allocated_target(budget: &Budget, total_income: Decimal) -> Result<Decimal, CoreError> {
        total_income
            .checked_mul(budget.allocation_percentage)
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .map(|target| target.round_dp(2))
            .ok_or_else(|| {
                DomainError::AmountOverflow(format!(
                    "{}% of {total_income} for budget {}",
                    budget.allocation_percentage, budget.id
                ))
                .into()
            })
    }

    /// Rejects `candidate` when an active budget of the same user already
    /// tracks one of its categories.
    pub fn ensure_no_overlap<'a>(
        budgets: impl IntoIterator<Item = &'a Budget>,
        candidate: &Budget,
    ) -> Result<(), CoreError> {
        if !candidate.is_active {
            return Ok(());
        }
        for existing in budgets {
            if existing.id == candidate.id
                || existing.user_id != candidate.user_id
                || !existing.is_active
            {
                continue;
            }
            if let Some(shared) = existing
                .category_ids
                .intersection(&candidate.category_ids)
                .next()
            {
                return Err(CoreError::OverlappingBudget {
                    candidate: candidate.id,
                    existing: existing.id,
                    category_id: *shared,
                });
            }
        }
        Ok(())
    }

    pub fn status(budget: &Budget, near_limit_percent: Decimal) -> BudgetStatus {
        BudgetStatus {
            budget_id: budget.id,
            current_amount: budget.current_amount,
            target_amount: budget.target_amount,
            remaining_amount: Self::remaining_amount(budget),
            spent_percentage: Self::spent_percentage(budget),
            is_exceeded: Self::is_exceeded(budget),
            is_near_limit: Self::is_near_limit(budget, near_limit_percent),
        }
    }

    /// Whether `txn` belongs in the budget's current accumulator.
    pub fn counts(budget: &Budget, txn: &Transaction) -> bool {
        budget.is_active
            && budget.tracks(txn.category_id)
            && budget.current_window().contains(txn.date)
    }
}

fn overflow(budget: &Budget) -> CoreError {
    DomainError::AmountOverflow(format!("spending of budget {}", budget.id)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain::{BudgetPeriod, FlowKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn budget(user: Uuid, category: Uuid) -> Budget {
        Budget::new(
            user,
            "Groceries",
            Decimal::new(20, 0),
            Decimal::new(1000, 0),
            [category],
            BudgetPeriod::Monthly,
            date(2025, 5, 1),
            Utc::now(),
        )
        .unwrap()
    }

    fn spend(user: Uuid, category: Uuid, amount: i64, on: NaiveDate) -> Transaction {
        Transaction::manual(
            user,
            Uuid::new_v4(),
            category,
            FlowKind::Expense,
            Decimal::new(amount, 0),
            on,
            "shop",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn budget_at_eighty_percent_is_near_limit_but_not_exceeded() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        let counted =
            BudgetService::apply_transaction(&mut b, &spend(user, category, 800, date(2025, 5, 10)), Utc::now())
                .unwrap();
        assert!(counted);
        assert!(BudgetService::is_near_limit(&b, Decimal::new(80, 0)));
        assert!(!BudgetService::is_exceeded(&b));
        assert_eq!(BudgetService::remaining_amount(&b), Decimal::new(200, 0));
        assert_eq!(BudgetService::spent_percentage(&b), Decimal::new(80, 0));
    }

    #[test]
    fn untracked_and_out_of_period_spending_is_ignored() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        let other = spend(user, Uuid::new_v4(), 50, date(2025, 5, 10));
        let previous_month = spend(user, category, 50, date(2025, 4, 30));
        assert!(!BudgetService::apply_transaction(&mut b, &other, Utc::now()).unwrap());
        assert!(!BudgetService::apply_transaction(&mut b, &previous_month, Utc::now()).unwrap());
        assert_eq!(b.current_amount, Decimal::ZERO);
    }

    #[test]
    fn foreign_transaction_is_an_ownership_violation() {
        let category = Uuid::new_v4();
        let mut b = budget(Uuid::new_v4(), category);
        let err = BudgetService::apply_transaction(
            &mut b,
            &spend(Uuid::new_v4(), category, 10, date(2025, 5, 2)),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::OwnershipViolation(_)));
    }

    #[test]
    fn exceeded_requires_strictly_more_than_target() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        b.current_amount = Decimal::new(1000, 0);
        assert!(!BudgetService::is_exceeded(&b));
        b.current_amount = Decimal::new(100001, 2);
        assert!(BudgetService::is_exceeded(&b));
        assert_eq!(BudgetService::remaining_amount(&b), Decimal::ZERO);
    }

    #[test]
    fn reset_and_release_only_touch_the_accumulator() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        b.current_amount = Decimal::new(300, 0);
        BudgetService::release_spending(&mut b, Decimal::new(500, 0), Utc::now());
        assert_eq!(b.current_amount, Decimal::ZERO);

        b.current_amount = Decimal::new(300, 0);
        BudgetService::reset_spending(&mut b, date(2025, 6, 1), Utc::now());
        assert_eq!(b.current_amount, Decimal::ZERO);
        assert_eq!(b.target_amount, Decimal::new(1000, 0));
        assert_eq!(b.period_start, date(2025, 6, 1));
    }

    #[test]
    fn roll_forward_skips_elapsed_periods() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        b.current_amount = Decimal::new(10, 0);
        assert_eq!(BudgetService::roll_forward(&mut b, date(2025, 5, 31), Utc::now()), 0);
        assert_eq!(b.current_amount, Decimal::new(10, 0));
        assert_eq!(BudgetService::roll_forward(&mut b, date(2025, 8, 3), Utc::now()), 3);
        assert_eq!(b.period_start, date(2025, 8, 1));
        assert_eq!(b.current_amount, Decimal::ZERO);
    }

    #[test]
    fn reconcile_rebuilds_from_history() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        b.current_amount = Decimal::new(999, 0);
        let history = vec![
            spend(user, category, 120, date(2025, 5, 3)),
            spend(user, category, 30, date(2025, 5, 20)),
            spend(user, category, 70, date(2025, 4, 20)),
            spend(Uuid::new_v4(), category, 70, date(2025, 5, 20)),
        ];
        assert_eq!(
            BudgetService::reconcile(&mut b, &history, Utc::now()).unwrap(),
            Decimal::new(150, 0)
        );
        assert_eq!(b.current_amount, Decimal::new(150, 0));
    }

    #[test]
    fn overlapping_active_budgets_are_rejected() {
        let user = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let existing = budget(user, shared);
        let mut candidate = budget(user, shared);
        let err = BudgetService::ensure_no_overlap([&existing], &candidate).unwrap_err();
        assert!(matches!(err, CoreError::OverlappingBudget { category_id, .. } if category_id == shared));

        candidate.is_active = false;
        assert!(BudgetService::ensure_no_overlap([&existing], &candidate).is_ok());
        let other_user = budget(Uuid::new_v4(), shared);
        assert!(BudgetService::ensure_no_overlap([&other_user], &existing).is_ok());
    }

    #[test]
    fn allocation_targets_follow_income() {
        let b = budget(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            BudgetService::allocated_target(&b, Decimal::new(4500, 0)).unwrap(),
            Decimal::new(900, 0)
        );
        assert!(BudgetService::allocated_target(&b, Decimal::MAX).is_err());
    }

    #[test]
    fn extreme_ratios_do_not_panic() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        b.target_amount = Decimal::new(1, 10);
        b.current_amount = Decimal::from_scientific("1e20").unwrap();
        let status = BudgetService::status(&b, Decimal::new(80, 0));
        assert_eq!(status.spent_percentage, Decimal::MAX);
        assert!(status.is_exceeded);
        assert!(status.is_near_limit);
    }

    #[test]
    fn overflowing_spend_is_rejected_and_leaves_the_accumulator() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut b = budget(user, category);
        b.current_amount = Decimal::MAX;
        let err = BudgetService::apply_transaction(
            &mut b,
            &spend(user, category, 1, date(2025, 5, 2)),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Domain(DomainError::AmountOverflow(_))));
        assert_eq!(b.current_amount, Decimal::MAX);
    }
}
