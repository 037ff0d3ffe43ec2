use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard},
};

use cadence_core::{CoreError, LedgerState, LedgerStore, PostOutcome};
use cadence_domain::{
    Account, Budget, Category, DateWindow, Entry, NetWorthSnapshot, Routine, Transaction, User,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

const LEDGER_FILE: &str = "ledger.json";
const BACKUP_DIR: &str = "backups";
const BACKUP_EXTENSION: &str = "json";
const BACKUP_PREFIX: &str = "ledger";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// Describes a persisted backup of the ledger file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// File-backed [`LedgerStore`]. The whole ledger lives in one JSON document.
///
/// Every mutation is applied to a copy of the in-memory state, written to a
/// temporary file and renamed over the ledger. Only after the rename succeeds
/// does the copy replace the in-memory state, so a failed write changes nothing.
#[derive(Debug)]
pub struct JsonLedgerStore {
    root: PathBuf,
    retention: usize,
    state: RwLock<LedgerState>,
}

impl JsonLedgerStore {
    /// Opens the ledger under `root`, starting empty if no file exists yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        Self::with_retention(root, DEFAULT_RETENTION)
    }

    pub fn with_retention(root: impl Into<PathBuf>, retention: usize) -> Result<Self, CoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let path = root.join(LEDGER_FILE);
        let state = if path.exists() {
            load_state_from_path(&path)?
        } else {
            LedgerState::new()
        };
        info!(
            path = %path.display(),
            users = state.users.len(),
            transactions = state.transactions.len(),
            "ledger opened"
        );
        Ok(Self {
            root,
            retention: retention.max(1),
            state: RwLock::new(state),
        })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    /// Dangling references found in the current state.
    pub fn warnings(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.read()?.warnings())
    }

    /// Copies the current ledger file into the backup directory, pruning old copies.
    pub fn backup(&self, note: Option<&str>) -> Result<BackupInfo, CoreError> {
        let state = self.read()?;
        let dir = self.backup_dir();
        fs::create_dir_all(&dir)?;
        let now = Utc::now();
        let mut stem = format!("{}_{}", BACKUP_PREFIX, now.format(BACKUP_TIMESTAMP_FORMAT));
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let mut file_name = format!("{}.{}", stem, BACKUP_EXTENSION);
        let mut copy = 1;
        while dir.join(&file_name).exists() {
            copy += 1;
            file_name = format!("{}_{}.{}", stem, copy, BACKUP_EXTENSION);
        }
        let path = dir.join(&file_name);
        write_atomic(&path, &serialize_state(&state)?)?;
        drop(state);
        self.prune_backups()?;
        debug!(backup = %file_name, "ledger backup written");
        Ok(BackupInfo {
            created_at: parse_backup_timestamp(&file_name),
            id: file_name,
            path,
        })
    }

    /// Backups newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        let dir = self.backup_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(BackupInfo {
                    id: file_name.to_string(),
                    created_at: parse_backup_timestamp(file_name),
                    path: path.clone(),
                });
            }
        }
        entries.sort_by_key(|info| Reverse((info.created_at, info.id.clone())));
        Ok(entries)
    }

    /// Replaces the ledger with a backup, on disk and in memory.
    pub fn restore_backup(&self, backup: &BackupInfo) -> Result<(), CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let restored = load_state_from_path(&backup.path)?;
        let mut guard = self
            .state
            .write()
            .map_err(|_| CoreError::Storage("ledger state lock poisoned".into()))?;
        save_state_to_path(&restored, &self.ledger_path())?;
        *guard = restored;
        info!(backup = %backup.id, "ledger restored from backup");
        Ok(())
    }

    fn prune_backups(&self) -> Result<(), CoreError> {
        for stale in self.list_backups()?.into_iter().skip(self.retention) {
            let _ = fs::remove_file(stale.path);
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, CoreError> {
        self.state
            .read()
            .map_err(|_| CoreError::Storage("ledger state lock poisoned".into()))
    }

    /// Applies `change` to a copy of the state and commits it once persisted.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut LedgerState) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| CoreError::Storage("ledger state lock poisoned".into()))?;
        let mut next = guard.clone();
        let value = change(&mut next)?;
        save_state_to_path(&next, &self.ledger_path())?;
        *guard = next;
        Ok(value)
    }
}

impl LedgerStore for JsonLedgerStore {
    fn user(&self, id: Uuid) -> Result<User, CoreError> {
        self.read()?.user(id).cloned()
    }

    fn users(&self) -> Result<Vec<User>, CoreError> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    fn insert_user(&self, user: User) -> Result<(), CoreError> {
        self.mutate(|state| state.insert_user(user))
    }

    fn delete_user(&self, id: Uuid) -> Result<(), CoreError> {
        self.mutate(|state| state.delete_user(id))
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
        self.mutate(|state| state.insert_account(account))
    }

    fn set_account_balance(
        &self,
        id: Uuid,
        balance: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Account, CoreError> {
        self.mutate(|state| state.set_account_balance(id, balance, at))
    }

    fn category(&self, id: Uuid) -> Result<Category, CoreError> {
        self.read()?.category(id).cloned()
    }

    fn insert_category(&self, category: Category) -> Result<(), CoreError> {
        self.mutate(|state| state.insert_category(category))
    }

    fn entry(&self, id: Uuid) -> Result<Entry, CoreError> {
        self.read()?.entry(id).cloned()
    }

    fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<Entry>, CoreError> {
        Ok(self.read()?.entries_for_user(user_id))
    }

    fn upsert_entry(&self, entry: Entry) -> Result<(), CoreError> {
        self.mutate(|state| state.upsert_entry(entry))
    }

    fn budget(&self, id: Uuid) -> Result<Budget, CoreError> {
        self.read()?.budget(id).cloned()
    }

    fn budgets_for_user(&self, user_id: Uuid) -> Result<Vec<Budget>, CoreError> {
        Ok(self.read()?.budgets_for_user(user_id))
    }

    fn upsert_budget(&self, budget: Budget) -> Result<(), CoreError> {
        self.mutate(|state| state.upsert_budget(budget))
    }

    fn routine(&self, id: Uuid) -> Result<Routine, CoreError> {
        self.read()?.routine(id).cloned()
    }

    fn upsert_routine(&self, routine: Routine) -> Result<(), CoreError> {
        self.mutate(|state| state.upsert_routine(routine))
    }

    fn save_routine_with_entries(
        &self,
        routine: Routine,
        entries: Vec<Entry>,
    ) -> Result<(), CoreError> {
        self.mutate(|state| state.save_routine_with_entries(routine, entries))
    }

    fn has_occurrence(&self, pattern_id: Uuid, date: NaiveDate) -> Result<bool, CoreError> {
        Ok(self.read()?.has_occurrence(pattern_id, date))
    }

    fn post_transaction(
        &self,
        txn: &Transaction,
        at: DateTime<Utc>,
    ) -> Result<PostOutcome, CoreError> {
        if self.has_occurrence_for(txn)? {
            return Ok(PostOutcome::AlreadyPosted);
        }
        self.mutate(|state| state.post_transaction(txn, at))
    }

    fn transactions_for_user(
        &self,
        user_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<Transaction>, CoreError> {
        Ok(self.read()?.transactions_for_user(user_id, window))
    }

    fn append_snapshot(&self, snapshot: &NetWorthSnapshot) -> Result<bool, CoreError> {
        if self.read()?.snapshots.iter().any(|s| s.id == snapshot.id) {
            return Ok(false);
        }
        self.mutate(|state| state.append_snapshot(snapshot))
    }

    fn snapshots_for_user(&self, user_id: Uuid) -> Result<Vec<NetWorthSnapshot>, CoreError> {
        Ok(self.read()?.snapshots_for_user(user_id))
    }
}

impl JsonLedgerStore {
    /// Skips the file write for occurrences that are already on the ledger.
    fn has_occurrence_for(&self, txn: &Transaction) -> Result<bool, CoreError> {
        match txn.occurrence_key() {
            Some((pattern_id, date)) => Ok(self.read()?.has_occurrence(pattern_id, date)),
            None => Ok(false),
        }
    }
}

/// Writes a ledger document to an arbitrary path via a temporary file.
pub fn save_state_to_path(state: &LedgerState, path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_state(state)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads a ledger document and rebuilds its occurrence index.
pub fn load_state_from_path(path: &Path) -> Result<LedgerState, CoreError> {
    let data = fs::read_to_string(path)?;
    let mut state: LedgerState =
        serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))?;
    state.reindex();
    Ok(state)
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !sanitized.is_empty() && !last_dash {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Reads `ledger_YYYYMMDD_HHMMSS[_note][_N].json` back into a timestamp.
fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{}", BACKUP_EXTENSION))?;
    let rest = stem.strip_prefix(&format!("{}_", BACKUP_PREFIX))?;
    let mut segments = rest.splitn(3, '_');
    let date = segments.next()?;
    let time = segments.next()?;
    if !is_digits(date, 8) || !is_digits(time, 6) {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

fn serialize_state(state: &LedgerState) -> Result<String, CoreError> {
    serde_json::to_string_pretty(state).map_err(|err| CoreError::Serde(err.to_string()))
}
