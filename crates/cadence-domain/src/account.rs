use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{Identifiable, NamedEntity, Owned},
    error::DomainError,
};

/// A balance-carrying account owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        opening_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            balance: opening_balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance after adding `delta`, without changing the account.
    pub fn balance_after(&self, delta: Decimal) -> Result<Decimal, DomainError> {
        self.balance.checked_add(delta).ok_or_else(|| {
            DomainError::AmountOverflow(format!(
                "balance {} of account {} cannot absorb {delta}",
                self.balance, self.id
            ))
        })
    }

    /// Adds a signed delta. Only the ledger store's posting path calls this.
    /// The balance is left untouched when the sum does not fit.
    pub fn apply_delta(&mut self, delta: Decimal, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.balance = self.balance_after(delta)?;
        self.updated_at = at;
        Ok(())
    }

    /// Overwrites the balance. Reserved for explicit reconciliation, never for posting.
    pub fn set_balance(&mut self, balance: Decimal, at: DateTime<Utc>) {
        self.balance = balance;
        self.updated_at = at;
    }
}

impl Identifiable for Account {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Account {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Owned for Account {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}
