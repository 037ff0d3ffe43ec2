//! Turns schedule occurrences into posted ledger transactions.
//!
//! Every occurrence goes through [`LedgerStore::post_transaction`], which
//! appends the transaction and applies the balance delta as one unit and keeps
//! `(pattern_id, date)` unique. Re-running a pass over the same dates is a no-op.

use chrono::NaiveDate;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use cadence_domain::{Entry, Transaction};

use crate::{
    concurrency::{CancellationToken, KeyedLocks},
    recurrence_service::RecurrenceService,
    schedule_service::ScheduleService,
    settings::EngineSettings,
    storage::{LedgerStore, PostOutcome},
    time::Clock,
    CoreError,
};

/// What one materialization pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializationReport {
    pub entry_id: Uuid,
    /// Transactions posted by this pass, in date order.
    pub created: Vec<Transaction>,
    pub duplicates_skipped: usize,
    /// Dates handed in that the entry's rule does not produce.
    pub off_schedule_skipped: usize,
    pub retries: u32,
    pub cancelled: bool,
    /// Stopped at the per-pass cap; a later pass picks up the rest.
    pub truncated: bool,
    pub inactive: bool,
}

impl MaterializationReport {
    fn new(entry_id: Uuid) -> Self {
        Self {
            entry_id,
            ..Self::default()
        }
    }

    pub fn posted(&self) -> usize {
        self.created.len()
    }
}

pub struct Materializer<'a> {
    store: &'a dyn LedgerStore,
    clock: &'a dyn Clock,
    locks: &'a KeyedLocks,
    settings: &'a EngineSettings,
}

impl<'a> Materializer<'a> {
    pub fn new(
        store: &'a dyn LedgerStore,
        clock: &'a dyn Clock,
        locks: &'a KeyedLocks,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            store,
            clock,
            locks,
            settings,
        }
    }

    /// Posts one transaction per date in `dates` that the entry's rule
    /// produces and that is not already on the ledger.
    pub fn materialize<I>(
        &self,
        entry: &Entry,
        dates: I,
        cancel: &CancellationToken,
    ) -> Result<MaterializationReport, CoreError>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let span = info_span!("materialize", entry_id = %entry.id, user_id = %entry.user_id);
        let _enter = span.enter();

        let mut report = MaterializationReport::new(entry.id);
        if !entry.is_active {
            debug!("entry inactive; nothing to materialize");
            report.inactive = true;
            return Ok(report);
        }
        self.check_ownership(entry)?;

        let _guard = self.locks.acquire(entry.id, self.settings.lock_timeout)?;
        for date in dates {
            if cancel.is_cancelled() {
                info!(%date, "materialization cancelled");
                report.cancelled = true;
                break;
            }
            if report.posted() >= self.settings.max_occurrences_per_pass {
                info!(%date, limit = self.settings.max_occurrences_per_pass, "per-pass limit reached");
                report.truncated = true;
                break;
            }
            if !RecurrenceService::occurs_on(entry, date) {
                debug!(%date, "date is not an occurrence; skipping");
                report.off_schedule_skipped += 1;
                continue;
            }
            self.post_occurrence(entry, date, &mut report)?;
        }

        info!(
            posted = report.posted(),
            duplicates = report.duplicates_skipped,
            retries = report.retries,
            cancelled = report.cancelled,
            "materialization pass finished"
        );
        Ok(report)
    }

    /// Materializes every occurrence from the entry's start through `today`.
    pub fn materialize_due(
        &self,
        entry: &Entry,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<MaterializationReport, CoreError> {
        self.materialize(entry, ScheduleService::expand(entry, entry.start_date, today), cancel)
    }

    /// Posts a manual transaction through the same atomic path as occurrences.
    pub fn record_manual(&self, txn: &Transaction) -> Result<Transaction, CoreError> {
        if txn.is_from_pattern || txn.pattern_id.is_some() {
            return Err(CoreError::Validation(format!(
                "transaction {} is generated by an entry; materialize it instead",
                txn.id
            )));
        }
        self.store.post_transaction(txn, self.clock.now())?;
        debug!(txn_id = %txn.id, account_id = %txn.account_id, "manual transaction posted");
        Ok(txn.clone())
    }

    fn check_ownership(&self, entry: &Entry) -> Result<(), CoreError> {
        let account = self.store.account(entry.account_id)?;
        if account.user_id != entry.user_id {
            error!(
                account_id = %account.id,
                account_owner = %account.user_id,
                "entry targets an account owned by another user"
            );
            return Err(CoreError::AccountMismatch {
                entry_id: entry.id,
                account_id: account.id,
            });
        }
        let category = self.store.category(entry.category_id)?;
        if category.user_id != entry.user_id {
            error!(category_id = %category.id, "entry uses a category owned by another user");
            return Err(CoreError::OwnershipViolation(format!(
                "category {} is not owned by user {}",
                category.id, entry.user_id
            )));
        }
        if category.kind != entry.kind {
            error!(category_id = %category.id, "entry kind does not match its category");
            return Err(CoreError::CategoryTypeMismatch {
                category_id: category.id,
                category_kind: category.kind,
                record_kind: entry.kind,
            });
        }
        Ok(())
    }

    /// Posts one occurrence, retrying transient store failures. The
    /// idempotency check runs before every attempt, so a write that
    /// committed despite reporting failure is recognised rather than repeated.
    fn post_occurrence(
        &self,
        entry: &Entry,
        date: NaiveDate,
        report: &mut MaterializationReport,
    ) -> Result<(), CoreError> {
        let mut pending: Option<Transaction> = None;
        let mut attempt: u32 = 0;
        loop {
            match self.try_post(entry, date) {
                Ok(Attempt::Posted(txn)) => {
                    report.created.push(txn);
                    return Ok(());
                }
                Ok(Attempt::Present) => {
                    match pending.take() {
                        Some(txn) => {
                            debug!(%date, "earlier attempt committed");
                            report.created.push(txn);
                        }
                        None => {
                            debug!(%date, "occurrence already posted; skipping");
                            report.duplicates_skipped += 1;
                        }
                    }
                    return Ok(());
                }
                Err((err, txn)) if err.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    report.retries += 1;
                    warn!(%date, attempt, error = %err, "transient store failure; retrying");
                    if txn.is_some() {
                        pending = txn;
                    }
                }
                Err((err, _)) => {
                    error!(%date, error = %err, "failed to post occurrence");
                    return Err(err);
                }
            }
        }
    }

    fn try_post(
        &self,
        entry: &Entry,
        date: NaiveDate,
    ) -> Result<Attempt, (CoreError, Option<Transaction>)> {
        if self
            .store
            .has_occurrence(entry.id, date)
            .map_err(|err| (err, None))?
        {
            return Ok(Attempt::Present);
        }
        let now = self.clock.now();
        let txn = Transaction::from_entry(entry, date, now);
        match self.store.post_transaction(&txn, now) {
            Ok(PostOutcome::Posted) => Ok(Attempt::Posted(txn)),
            Ok(PostOutcome::AlreadyPosted) => Ok(Attempt::Present),
            Err(err) => Err((err, Some(txn))),
        }
    }
}

enum Attempt {
    Posted(Transaction),
    Present,
}
