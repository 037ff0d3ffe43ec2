//! The aggregate ledger document shared by every store implementation.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cadence_domain::{
    Account, Budget, Category, DateWindow, Entry, FlowKind, NetWorthSnapshot, OccurrenceKey,
    Routine, Transaction, User,
};

use crate::{budget_service::BudgetService, storage::PostOutcome, CoreError};

/// Every record the engine persists. Mutating methods validate first and only
/// then write, so a failed call leaves the state untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub users: BTreeMap<Uuid, User>,
    #[serde(default)]
    pub accounts: BTreeMap<Uuid, Account>,
    #[serde(default)]
    pub categories: BTreeMap<Uuid, Category>,
    #[serde(default)]
    pub entries: BTreeMap<Uuid, Entry>,
    #[serde(default)]
    pub budgets: BTreeMap<Uuid, Budget>,
    #[serde(default)]
    pub routines: BTreeMap<Uuid, Routine>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub snapshots: Vec<NetWorthSnapshot>,
    #[serde(skip)]
    posted: HashSet<OccurrenceKey>,
    #[serde(skip)]
    transaction_ids: HashSet<Uuid>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the occurrence and transaction id indexes. Call after deserializing.
    pub fn reindex(&mut self) {
        self.posted = self
            .transactions
            .iter()
            .filter_map(Transaction::occurrence_key)
            .collect();
        self.transaction_ids = self.transactions.iter().map(|t| t.id).collect();
    }

    pub fn has_occurrence(&self, pattern_id: Uuid, date: NaiveDate) -> bool {
        self.posted.contains(&(pattern_id, date))
    }

    // --- users -----------------------------------------------------------

    pub fn user(&self, id: Uuid) -> Result<&User, CoreError> {
        self.users.get(&id).ok_or(CoreError::UserNotFound(id))
    }

    pub fn insert_user(&mut self, user: User) -> Result<(), CoreError> {
        user.validate()?;
        if self.users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(CoreError::Validation(format!(
                "email `{}` is already registered",
                user.email
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    /// Removes a user that owns nothing. Users with records are refused.
    pub fn delete_user(&mut self, id: Uuid) -> Result<(), CoreError> {
        self.user(id)?;
        let owns_records = self.accounts.values().any(|a| a.user_id == id)
            || self.categories.values().any(|c| c.user_id == id)
            || self.entries.values().any(|e| e.user_id == id)
            || self.budgets.values().any(|b| b.user_id == id)
            || self.routines.values().any(|r| r.user_id == id)
            || self.transactions.iter().any(|t| t.user_id == id)
            || self.snapshots.iter().any(|s| s.user_id == id);
        if owns_records {
            return Err(CoreError::UserHasDependents(id));
        }
        self.users.remove(&id);
        Ok(())
    }

    // --- accounts & categories ---------------------------------------------

    pub fn account(&self, id: Uuid) -> Result<&Account, CoreError> {
        self.accounts.get(&id).ok_or(CoreError::AccountNotFound(id))
    }

    pub fn insert_account(&mut self, account: Account) -> Result<(), CoreError> {
        self.user(account.user_id)?;
        if account.name.trim().is_empty() {
            return Err(CoreError::Validation("account name is empty".into()));
        }
        self.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn set_account_balance(
        &mut self,
        id: Uuid,
        balance: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Account, CoreError> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(CoreError::AccountNotFound(id))?;
        account.set_balance(balance, at);
        Ok(account.clone())
    }

    pub fn category(&self, id: Uuid) -> Result<&Category, CoreError> {
        self.categories
            .get(&id)
            .ok_or(CoreError::CategoryNotFound(id))
    }

    pub fn insert_category(&mut self, category: Category) -> Result<(), CoreError> {
        self.user(category.user_id)?;
        if category.name.trim().is_empty() {
            return Err(CoreError::Validation("category name is empty".into()));
        }
        self.categories.insert(category.id, category);
        Ok(())
    }

    // --- entries, budgets, routines ------------------------------------------

    pub fn entry(&self, id: Uuid) -> Result<&Entry, CoreError> {
        self.entries.get(&id).ok_or(CoreError::EntryNotFound(id))
    }

    pub fn entries_for_user(&self, user_id: Uuid) -> Vec<Entry> {
        self.entries
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn upsert_entry(&mut self, entry: Entry) -> Result<(), CoreError> {
        entry.validate()?;
        self.user(entry.user_id)?;
        self.check_references(
            entry.id,
            entry.user_id,
            entry.account_id,
            entry.category_id,
            entry.kind,
        )?;
        if let Some(routine_id) = entry.routine_id {
            let routine = self
                .routines
                .get(&routine_id)
                .ok_or(CoreError::RoutineNotFound(routine_id))?;
            if routine.user_id != entry.user_id {
                return Err(CoreError::OwnershipViolation(format!(
                    "routine {routine_id} is not owned by user {}",
                    entry.user_id
                )));
            }
        }
        self.entries.insert(entry.id, entry);
        Ok(())
    }

    pub fn budget(&self, id: Uuid) -> Result<&Budget, CoreError> {
        self.budgets.get(&id).ok_or(CoreError::BudgetNotFound(id))
    }

    pub fn budgets_for_user(&self, user_id: Uuid) -> Vec<Budget> {
        self.budgets
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn upsert_budget(&mut self, budget: Budget) -> Result<(), CoreError> {
        budget.validate()?;
        self.user(budget.user_id)?;
        for category_id in &budget.category_ids {
            let category = self.category(*category_id)?;
            if category.user_id != budget.user_id {
                return Err(CoreError::OwnershipViolation(format!(
                    "category {category_id} is not owned by user {}",
                    budget.user_id
                )));
            }
        }
        BudgetService::ensure_no_overlap(self.budgets.values(), &budget)?;
        self.budgets.insert(budget.id, budget);
        Ok(())
    }

    pub fn routine(&self, id: Uuid) -> Result<&Routine, CoreError> {
        self.routines
            .get(&id)
            .ok_or(CoreError::RoutineNotFound(id))
    }

    pub fn upsert_routine(&mut self, routine: Routine) -> Result<(), CoreError> {
        self.user(routine.user_id)?;
        if routine.name.trim().is_empty() {
            return Err(CoreError::Validation("routine name is empty".into()));
        }
        self.routines.insert(routine.id, routine);
        Ok(())
    }

    /// Writes a routine together with its member entries as one unit.
    pub fn save_routine_with_entries(
        &mut self,
        routine: Routine,
        entries: Vec<Entry>,
    ) -> Result<(), CoreError> {
        self.user(routine.user_id)?;
        for entry in &entries {
            self.entry(entry.id)?;
            if entry.user_id != routine.user_id {
                return Err(CoreError::OwnershipViolation(format!(
                    "entry {} is not owned by user {}",
                    entry.id, routine.user_id
                )));
            }
            if entry.routine_id != Some(routine.id) {
                return Err(CoreError::Validation(format!(
                    "entry {} is not a member of routine {}",
                    entry.id, routine.id
                )));
            }
        }
        self.routines.insert(routine.id, routine);
        for entry in entries {
            self.entries.insert(entry.id, entry);
        }
        Ok(())
    }

    // --- ledger ------------------------------------------------------------

    /// Posts a transaction and its balance delta together. A pattern
    /// occurrence that already exists is reported, not re-applied.
    pub fn post_transaction(
        &mut self,
        txn: &Transaction,
        at: DateTime<Utc>,
    ) -> Result<PostOutcome, CoreError> {
        let key = txn.occurrence_key();
        if let Some(key) = key {
            if self.posted.contains(&key) {
                return Ok(PostOutcome::AlreadyPosted);
            }
        }
        if txn.amount <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "transaction {} has non-positive amount {}",
                txn.id, txn.amount
            )));
        }
        if self.transaction_ids.contains(&txn.id) {
            return Err(CoreError::Validation(format!(
                "transaction {} already exists",
                txn.id
            )));
        }
        self.user(txn.user_id)?;
        self.check_references(
            txn.pattern_id.unwrap_or(txn.id),
            txn.user_id,
            txn.account_id,
            txn.category_id,
            txn.kind,
        )?;

        let account = self
            .accounts
            .get_mut(&txn.account_id)
            .ok_or(CoreError::AccountNotFound(txn.account_id))?;
        account.apply_delta(txn.signed_amount(), at)?;
        if let Some(key) = key {
            self.posted.insert(key);
        }
        self.transaction_ids.insert(txn.id);
        self.transactions.push(txn.clone());
        Ok(PostOutcome::Posted)
    }

    /// Transactions of `user_id` dated inside `window`, ordered by date then creation.
    pub fn transactions_for_user(&self, user_id: Uuid, window: DateWindow) -> Vec<Transaction> {
        let mut rows: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && window.contains(t.date))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        rows
    }

    /// Appends a snapshot. Returns `false` when one with the same id already exists.
    pub fn append_snapshot(&mut self, snapshot: &NetWorthSnapshot) -> Result<bool, CoreError> {
        self.user(snapshot.user_id)?;
        if self.snapshots.iter().any(|s| s.id == snapshot.id) {
            return Ok(false);
        }
        self.snapshots.push(snapshot.clone());
        Ok(true)
    }

    pub fn snapshots_for_user(&self, user_id: Uuid) -> Vec<NetWorthSnapshot> {
        let mut rows: Vec<NetWorthSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.date, s.calculated_from as u8));
        rows
    }

    /// Dangling references and other anomalies, for diagnostics.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for txn in &self.transactions {
            if !self.accounts.contains_key(&txn.account_id) {
                warnings.push(format!(
                    "transaction {} references unknown account {}",
                    txn.id, txn.account_id
                ));
            }
            if !self.categories.contains_key(&txn.category_id) {
                warnings.push(format!(
                    "transaction {} references missing category {}",
                    txn.id, txn.category_id
                ));
            }
            if let Some(pattern_id) = txn.pattern_id {
                if !self.entries.contains_key(&pattern_id) {
                    warnings.push(format!(
                        "transaction {} was generated by missing entry {}",
                        txn.id, pattern_id
                    ));
                }
            }
        }
        for entry in self.entries.values() {
            if let Some(routine_id) = entry.routine_id {
                if !self.routines.contains_key(&routine_id) {
                    warnings.push(format!(
                        "entry {} belongs to missing routine {}",
                        entry.id, routine_id
                    ));
                }
            }
            if let Some(account) = self.accounts.get(&entry.account_id) {
                if account.user_id != entry.user_id {
                    warnings.push(format!(
                        "entry {} targets account {} owned by another user",
                        entry.id, account.id
                    ));
                }
            }
        }
        warnings
    }

    fn check_references(
        &self,
        subject_id: Uuid,
        user_id: Uuid,
        account_id: Uuid,
        category_id: Uuid,
        kind: FlowKind,
    ) -> Result<(), CoreError> {
        let account = self.account(account_id)?;
        if account.user_id != user_id {
            return Err(CoreError::AccountMismatch {
                entry_id: subject_id,
                account_id,
            });
        }
        let category = self.category(category_id)?;
        if category.user_id != user_id {
            return Err(CoreError::OwnershipViolation(format!(
                "category {category_id} is not owned by user {user_id}"
            )));
        }
        if category.kind != kind {
            return Err(CoreError::CategoryTypeMismatch {
                category_id,
                category_kind: category.kind,
                record_kind: kind,
            });
        }
        Ok(())
    }
}
