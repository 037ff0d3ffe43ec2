//! Point-in-time income/expense rollups.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{DateWindow, Identifiable, Owned};

/// Aggregation granularity a snapshot was produced with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotGranularity {
    /// Cumulative: every transaction dated on or before the snapshot date.
    Daily,
    /// Month-to-date.
    Monthly,
    /// Year-to-date.
    Yearly,
}

impl SnapshotGranularity {
    pub fn window_for(self, as_of: NaiveDate) -> DateWindow {
        match self {
            SnapshotGranularity::Daily => DateWindow::through(as_of),
            SnapshotGranularity::Monthly => DateWindow::month_to_date(as_of),
            SnapshotGranularity::Yearly => DateWindow::year_to_date(as_of),
        }
    }
}

impl fmt::Display for SnapshotGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SnapshotGranularity::Daily => "daily",
            SnapshotGranularity::Monthly => "monthly",
            SnapshotGranularity::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

/// Immutable rollup; `net_worth == total_income - total_expense`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetWorthSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net_worth: Decimal,
    pub calculated_from: SnapshotGranularity,
}

impl NetWorthSnapshot {
    pub fn new(
        user_id: Uuid,
        date: NaiveDate,
        total_income: Decimal,
        total_expense: Decimal,
        calculated_from: SnapshotGranularity,
    ) -> Self {
        Self {
            id: snapshot_id(user_id, date, calculated_from),
            user_id,
            date,
            total_income,
            total_expense,
            net_worth: total_income - total_expense,
            calculated_from,
        }
    }

    /// Absolute gap between the stored net worth and the derived one.
    /// Saturates at `Decimal::MAX` when the gap itself does not fit.
    pub fn drift(&self) -> Decimal {
        self.total_income
            .checked_sub(self.total_expense)
            .and_then(|derived| self.net_worth.checked_sub(derived))
            .map(|gap| gap.abs())
            .unwrap_or(Decimal::MAX)
    }
}

impl Identifiable for NetWorthSnapshot {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Owned for NetWorthSnapshot {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}

pub fn snapshot_id(user_id: Uuid, date: NaiveDate, granularity: SnapshotGranularity) -> Uuid {
    let name = format!("{}:{}", date.format("%Y-%m-%d"), granularity);
    Uuid::new_v5(&user_id, name.as_bytes())
}
