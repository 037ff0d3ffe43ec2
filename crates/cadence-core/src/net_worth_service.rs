//! Income/expense rollups over a user's ledger.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use cadence_domain::{DomainError, FlowKind, NetWorthSnapshot, SnapshotGranularity, Transaction};

use crate::CoreError;

pub struct NetWorthService;

impl NetWorthService {
    /// Sums `transactions` inside the granularity window ending at `as_of`.
    ///
    /// Daily snapshots are cumulative over all history, monthly ones cover the
    /// month to date and yearly ones the year to date. Pure: the same inputs
    /// always produce the same snapshot, id included.
    pub fn snapshot(
        user_id: Uuid,
        transactions: &[Transaction],
        as_of: NaiveDate,
        granularity: SnapshotGranularity,
        tolerance: Decimal,
    ) -> Result<NetWorthSnapshot, CoreError> {
        let window = granularity.window_for(as_of);
        let mut total_income = Decimal::ZERO;
        let mut total_expense = Decimal::ZERO;
        for txn in transactions {
            if txn.user_id != user_id {
                return Err(CoreError::OwnershipViolation(format!(
                    "transaction {} does not belong to user {user_id}",
                    txn.id
                )));
            }
            if !window.contains(txn.date) {
                continue;
            }
            let total = match txn.kind {
                FlowKind::Income => &mut total_income,
                FlowKind::Expense => &mut total_expense,
            };
            *total = total.checked_add(txn.amount).ok_or_else(|| {
                DomainError::AmountOverflow(format!("{} total of user {user_id}", txn.kind))
            })?;
        }
        let snapshot =
            NetWorthSnapshot::new(user_id, as_of, total_income, total_expense, granularity);
        Self::verify(&snapshot, tolerance)?;
        Ok(snapshot)
    }

    /// Checks `|net_worth - (total_income - total_expense)| < tolerance`.
    /// An exact match always passes, even with a zero tolerance.
    pub fn verify(snapshot: &NetWorthSnapshot, tolerance: Decimal) -> Result<(), CoreError> {
        let drift = snapshot.drift();
        if !drift.is_zero() && drift >= tolerance {
            return Err(CoreError::ReconciliationFailure {
                snapshot_id: snapshot.id,
                drift,
            });
        }
        Ok(())
    }

    /// Net worth as a percentage of income, or zero when there is no income.
    /// Rates too large to represent saturate at `Decimal::MAX` or `Decimal::MIN`.
    pub fn savings_rate(snapshot: &NetWorthSnapshot) -> Decimal {
        if snapshot.total_income.is_zero() {
            return Decimal::ZERO;
        }
        snapshot
            .net_worth
            .checked_div(snapshot.total_income)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(|rate| rate.round_dp(2))
            .unwrap_or(if snapshot.net_worth.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            })
    }

    /// Whether the snapshot was taken within the period its granularity names,
    /// relative to `today`: the same day, month or year.
    pub fn is_within(snapshot: &NetWorthSnapshot, today: NaiveDate) -> bool {
        match snapshot.calculated_from {
            SnapshotGranularity::Daily => snapshot.date == today,
            SnapshotGranularity::Monthly => {
                snapshot.date.year() == today.year() && snapshot.date.month() == today.month()
            }
            SnapshotGranularity::Yearly => snapshot.date.year() == today.year(),
        }
    }
}
