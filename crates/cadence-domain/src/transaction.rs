//! Ledger postings. Immutable once created.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{FlowKind, Identifiable, Owned},
    entry::Entry,
    error::DomainError,
};

/// Uniqueness key of a materialized occurrence: `(pattern_id, date)`.
pub type OccurrenceKey = (Uuid, NaiveDate);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub kind: FlowKind,
    pub amount: Decimal,
    #[serde(default)]
    pub note: String,
    pub date: NaiveDate,
    pub is_from_pattern: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a manually entered transaction. These carry no uniqueness constraint.
    #[allow(clippy::too_many_arguments)]
    pub fn manual(
        user_id: Uuid,
        account_id: Uuid,
        category_id: Uuid,
        kind: FlowKind,
        amount: Decimal,
        date: NaiveDate,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "transaction amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            category_id,
            kind,
            amount,
            note: note.into(),
            date,
            is_from_pattern: false,
            pattern_id: None,
            created_at: now,
        })
    }

    /// Materializes one occurrence of `entry`. The id is derived from `(entry.id, date)`
    /// so repeated materialization of the same occurrence yields the same id.
    pub fn from_entry(entry: &Entry, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: occurrence_id(entry.id, date),
            user_id: entry.user_id,
            account_id: entry.account_id,
            category_id: entry.category_id,
            kind: entry.kind,
            amount: entry.amount,
            note: entry.name.clone(),
            date,
            is_from_pattern: true,
            pattern_id: Some(entry.id),
            created_at: now,
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    /// The uniqueness key, present only for pattern transactions.
    pub fn occurrence_key(&self) -> Option<OccurrenceKey> {
        match (self.is_from_pattern, self.pattern_id) {
            (true, Some(pattern_id)) => Some((pattern_id, self.date)),
            _ => None,
        }
    }
}

impl Identifiable for Transaction {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Owned for Transaction {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}

/// Deterministic transaction id for an occurrence of `pattern_id` on `date`.
pub fn occurrence_id(pattern_id: Uuid, date: NaiveDate) -> Uuid {
    Uuid::new_v5(&pattern_id, date.format("%Y-%m-%d").to_string().as_bytes())
}
