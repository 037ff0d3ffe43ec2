use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use cadence_domain::{
    Account, Budget, Category, DateWindow, Entry, NetWorthSnapshot, Routine, Transaction, User,
};

use crate::{state::LedgerState, CoreError};

/// Result of handing a transaction to [`LedgerStore::post_transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// The transaction was appended and its balance delta applied.
    Posted,
    /// The `(pattern_id, date)` occurrence was already present; nothing changed.
    AlreadyPosted,
}

/// Abstraction over persistence backends holding the ledger.
///
/// `post_transaction` is the single atomic unit: the append and the balance
/// delta commit together or not at all, and a pattern occurrence is posted at
/// most once.
pub trait LedgerStore: Send + Sync {
    fn user(&self, id: Uuid) -> Result<User, CoreError>;
    fn users(&self) -> Result<Vec<User>, CoreError>;
    fn insert_user(&self, user: User) -> Result<(), CoreError>;
    fn delete_user(&self, id: Uuid) -> Result<(), CoreError>;

    fn account(&self, id: Uuid) -> Result<Account, CoreError>;
    fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>, CoreError>;
    fn insert_account(&self, account: Account) -> Result<(), CoreError>;
    /// Overwrites a balance. Used by explicit reconciliation only.
    fn set_account_balance(
        &self,
        id: Uuid,
        balance: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Account, CoreError>;

    fn category(&self, id: Uuid) -> Result<Category, CoreError>;
    fn insert_category(&self, category: Category) -> Result<(), CoreError>;

    fn entry(&self, id: Uuid) -> Result<Entry, CoreError>;
    fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<Entry>, CoreError>;
    fn upsert_entry(&self, entry: Entry) -> Result<(), CoreError>;

    fn budget(&self, id: Uuid) -> Result<Budget, CoreError>;
    fn budgets_for_user(&self, user_id: Uuid) -> Result<Vec<Budget>, CoreError>;
    fn upsert_budget(&self, budget: Budget) -> Result<(), CoreError>;

    fn routine(&self, id: Uuid) -> Result<Routine, CoreError>;
    fn upsert_routine(&self, routine: Routine) -> Result<(), CoreError>;
    fn save_routine_with_entries(
        &self,
        routine: Routine,
        entries: Vec<Entry>,
    ) -> Result<(), CoreError>;

    fn has_occurrence(&self, pattern_id: Uuid, date: NaiveDate) -> Result<bool, CoreError>;
    fn post_transaction(
        &self,
        txn: &Transaction,
        at: DateTime<Utc>,
    ) -> Result<PostOutcome, CoreError>;
    fn transactions_for_user(
        &self,
        user_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<Transaction>, CoreError>;

    /// Append-only. Returns `false` if an identical snapshot is already stored.
    fn append_snapshot(&self, snapshot: &NetWorthSnapshot) -> Result<bool, CoreError>;
    fn snapshots_for_user(&self, user_id: Uuid) -> Result<Vec<NetWorthSnapshot>, CoreError>;
}

/// In-process store. Reads share a lock; every mutation is one write-locked step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(mut state: LedgerState) -> Self {
        state.reindex();
        Self {
            state: RwLock::new(state),
        }
    }

    /// Clone of the current state.
    pub fn export(&self) -> Result<LedgerState, CoreError> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, CoreError> {
        self.state
            .read()
            .map_err(|_| CoreError::Storage("ledger state lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, CoreError> {
        self.state
            .write()
            .map_err(|_| CoreError::Storage("ledger state lock poisoned".into()))
    }
}

impl LedgerStore for MemoryStore {
    fn user(&self, id: Uuid) -> Result<User, CoreError> {
        self.read()?.user(id).cloned()
    }

    fn users(&self) -> Result<Vec<User>, CoreError> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    fn insert_user(&self, user: User) -> Result<(), CoreError> {
        self.write()?.insert_user(user)
    }

    fn delete_user(&self, id: Uuid) -> Result<(), CoreError> {
        self.write()?.delete_user(id)
    }

    fn account(&self, id: Uuid) -> Result<Account, CoreError> {
        self.read()?.account(id).cloned()
    }

    fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>, CoreError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn insert_account(&self, account: Account) -> Result<(), CoreError> {
        self.write()?.insert_account(account)
    }

    fn set_account_balance(
        &self,
        id: Uuid,
        balance: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Account, CoreError> {
        self.write()?.set_account_balance(id, balance, at)
    }

    fn category(&self, id: Uuid) -> Result<Category, CoreError> {
        self.read()?.category(id).cloned()
    }

    fn insert_category(&self, category: Category) -> Result<(), CoreError> {
        self.write()?.insert_category(category)
    }

    fn entry(&self, id: Uuid) -> Result<Entry, CoreError> {
        self.read()?.entry(id).cloned()
    }

    fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<Entry>, CoreError> {
        Ok(self.read()?.entries_for_user(user_id))
    }

    fn upsert_entry(&self, entry: Entry) -> Result<(), CoreError> {
        self.write()?.upsert_entry(entry)
    }

    fn budget(&self, id: Uuid) -> Result<Budget, CoreError> {
        self.read()?.budget(id).cloned()
    }

    fn budgets_for_user(&self, user_id: Uuid) -> Result<Vec<Budget>, CoreError> {
        Ok(self.read()?.budgets_for_user(user_id))
    }

    fn upsert_budget(&self, budget: Budget) -> Result<(), CoreError> {
        self.write()?.upsert_budget(budget)
    }

    fn routine(&self, id: Uuid) -> Result<Routine, CoreError> {
        self.read()?.routine(id).cloned()
    }

    fn upsert_routine(&self, routine: Routine) -> Result<(), CoreError> {
        self.write()?.upsert_routine(routine)
    }

    fn save_routine_with_entries(
        &self,
        routine: Routine,
        entries: Vec<Entry>,
    ) -> Result<(), CoreError> {
        self.write()?.save_routine_with_entries(routine, entries)
    }

    fn has_occurrence(&self, pattern_id: Uuid, date: NaiveDate) -> Result<bool, CoreError> {
        Ok(self.read()?.has_occurrence(pattern_id, date))
    }

    fn post_transaction(
        &self,
        txn: &Transaction,
        at: DateTime<Utc>,
    ) -> Result<PostOutcome, CoreError> {
        self.write()?.post_transaction(txn, at)
    }

    fn transactions_for_user(
        &self,
        user_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<Transaction>, CoreError> {
        Ok(self.read()?.transactions_for_user(user_id, window))
    }

    fn append_snapshot(&self, snapshot: &NetWorthSnapshot) -> Result<bool, CoreError> {
        self.write()?.append_snapshot(snapshot)
    }

    fn snapshots_for_user(&self, user_id: Uuid) -> Result<Vec<NetWorthSnapshot>, CoreError> {
        Ok(self.read()?.snapshots_for_user(user_id))
    }
}
