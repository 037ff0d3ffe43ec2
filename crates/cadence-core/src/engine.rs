//! Store-backed entry point tying the services together.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cadence_domain::{
    Account, DateWindow, NetWorthSnapshot, SnapshotGranularity, Transaction,
};

use crate::{
    budget_service::{BudgetService, BudgetStatus},
    concurrency::{CancellationToken, KeyedLocks},
    materialize_service::{MaterializationReport, Materializer},
    net_worth_service::NetWorthService,
    routine_service::{RoutineService, RoutineTotals},
    schedule_service::{Occurrences, ScheduleService},
    settings::EngineSettings,
    storage::LedgerStore,
    time::{user_today, Clock},
    CoreError,
};

/// Outcome of one user's daily pass.
#[derive(Debug, Clone)]
pub struct UserPassReport {
    pub user_id: Uuid,
    /// The user's local date the pass ran for.
    pub today: NaiveDate,
    pub materialized: Vec<MaterializationReport>,
    pub budgets_rolled: u32,
    pub budget_hits: usize,
    pub snapshot: Option<NetWorthSnapshot>,
}

impl UserPassReport {
    pub fn posted(&self) -> usize {
        self.materialized.iter().map(MaterializationReport::posted).sum()
    }
}

pub struct Engine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::new(),
            settings,
        }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn materializer(&self) -> Materializer<'_> {
        Materializer::new(
            self.store.as_ref(),
            self.clock.as_ref(),
            &self.locks,
            &self.settings,
        )
    }

    /// "Today" in the zone of `user_id`.
    pub fn today_for(&self, user_id: Uuid) -> Result<NaiveDate, CoreError> {
        let user = self.store.user(user_id)?;
        user_today(self.clock.as_ref(), &user)
    }

    // --- schedules -----------------------------------------------------------

    pub fn expand_schedule(&self, entry_id: Uuid, window: DateWindow) -> Result<Occurrences, CoreError> {
        let entry = self.store.entry(entry_id)?;
        Ok(ScheduleService::expand_window(&entry, window))
    }

    pub fn next_due(&self, entry_id: Uuid) -> Result<Option<NaiveDate>, CoreError> {
        let entry = self.store.entry(entry_id)?;
        let today = self.today_for(entry.user_id)?;
        Ok(ScheduleService::next_due(&entry, today))
    }

    // --- materialization -----------------------------------------------------

    pub fn materialize(
        &self,
        entry_id: Uuid,
        window: DateWindow,
        cancel: &CancellationToken,
    ) -> Result<MaterializationReport, CoreError> {
        let entry = self.store.entry(entry_id)?;
        self.materializer()
            .materialize(&entry, ScheduleService::expand_window(&entry, window), cancel)
    }

    /// Catches one entry up through its owner's today.
    pub fn materialize_due(
        &self,
        entry_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<MaterializationReport, CoreError> {
        let entry = self.store.entry(entry_id)?;
        let today = self.today_for(entry.user_id)?;
        self.materializer().materialize_due(&entry, today, cancel)
    }

    /// Catches every active entry of `user_id` up through the user's today.
    pub fn materialize_due_for_user(
        &self,
        user_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Vec<MaterializationReport>, CoreError> {
        let today = self.today_for(user_id)?;
        let materializer = self.materializer();
        let mut reports = Vec::new();
        for entry in self.store.entries_for_user(user_id)? {
            if cancel.is_cancelled() {
                break;
            }
            if !entry.is_active {
                continue;
            }
            reports.push(materializer.materialize_due(&entry, today, cancel)?);
        }
        Ok(reports)
    }

    pub fn record_manual(&self, txn: &Transaction) -> Result<Transaction, CoreError> {
        self.materializer().record_manual(txn)
    }

    // --- budgets -------------------------------------------------------------

    /// Counts `txn` against one budget under that budget's lock.
    pub fn apply_transaction(&self, budget_id: Uuid, txn: &Transaction) -> Result<bool, CoreError> {
        let _guard = self.locks.acquire(budget_id, self.settings.lock_timeout)?;
        let mut budget = self.store.budget(budget_id)?;
        let counted = BudgetService::apply_transaction(&mut budget, txn, self.clock.now())?;
        if counted {
            let near_limit = BudgetService::is_near_limit(&budget, self.settings.near_limit_percent);
            let exceeded = BudgetService::is_exceeded(&budget);
            self.store.upsert_budget(budget)?;
            debug!(%budget_id, txn_id = %txn.id, near_limit, exceeded, "transaction counted against budget");
        }
        Ok(counted)
    }

    /// Applies `txn` to every budget of its owner that tracks it.
    pub fn apply_to_budgets(&self, txn: &Transaction) -> Result<usize, CoreError> {
        let mut hits = 0;
        for budget in self.store.budgets_for_user(txn.user_id)? {
            if budget.is_active && budget.tracks(txn.category_id) && self.apply_transaction(budget.id, txn)? {
                hits += 1;
            }
        }
        Ok(hits)
    }

    pub fn budget_status(&self, budget_id: Uuid) -> Result<BudgetStatus, CoreError> {
        let budget = self.store.budget(budget_id)?;
        Ok(BudgetService::status(&budget, self.settings.near_limit_percent))
    }

    pub fn reset_budget(&self, budget_id: Uuid, next_period_start: NaiveDate) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(budget_id, self.settings.lock_timeout)?;
        let mut budget = self.store.budget(budget_id)?;
        BudgetService::reset_spending(&mut budget, next_period_start, self.clock.now());
        self.store.upsert_budget(budget)
    }

    /// Moves every budget of `user_id` into the period containing `today`.
    pub fn roll_budgets_forward(&self, user_id: Uuid, today: NaiveDate) -> Result<u32, CoreError> {
        let mut rolled = 0;
        for budget in self.store.budgets_for_user(user_id)? {
            let _guard = self.locks.acquire(budget.id, self.settings.lock_timeout)?;
            let mut current = self.store.budget(budget.id)?;
            let crossed = BudgetService::roll_forward(&mut current, today, self.clock.now());
            if crossed > 0 {
                info!(budget_id = %current.id, periods = crossed, "budget rolled into a new period");
                self.store.upsert_budget(current)?;
                rolled += 1;
            }
        }
        Ok(rolled)
    }

    /// Rebuilds a budget's accumulator from the ledger.
    pub fn reconcile_budget(&self, budget_id: Uuid) -> Result<Decimal, CoreError> {
        let (before, after) = self.rebuild_budget(budget_id)?;
        if before != after {
            warn!(%budget_id, %before, %after, "budget accumulator corrected from history");
        }
        Ok(after)
    }

    /// Rebuilds every active budget of `user_id` from the ledger. Returns how
    /// many accumulators changed.
    pub fn rebuild_budgets_for_user(&self, user_id: Uuid) -> Result<usize, CoreError> {
        let mut changed = 0;
        for budget in self.store.budgets_for_user(user_id)? {
            if !budget.is_active {
                continue;
            }
            let (before, after) = self.rebuild_budget(budget.id)?;
            if before != after {
                debug!(budget_id = %budget.id, %before, %after, "budget rebuilt from ledger");
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn rebuild_budget(&self, budget_id: Uuid) -> Result<(Decimal, Decimal), CoreError> {
        let _guard = self.locks.acquire(budget_id, self.settings.lock_timeout)?;
        let mut budget = self.store.budget(budget_id)?;
        let history = self
            .store
            .transactions_for_user(budget.user_id, budget.current_window())?;
        let before = budget.current_amount;
        let after = BudgetService::reconcile(&mut budget, &history, self.clock.now())?;
        if after != before {
            self.store.upsert_budget(budget)?;
        }
        Ok((before, after))
    }

    // --- snapshots -----------------------------------------------------------

    /// Computes, verifies and appends a snapshot. Nothing is stored when
    /// verification fails.
    pub fn compute_snapshot(
        &self,
        user_id: Uuid,
        as_of: NaiveDate,
        granularity: SnapshotGranularity,
    ) -> Result<NetWorthSnapshot, CoreError> {
        self.store.user(user_id)?;
        let history = self
            .store
            .transactions_for_user(user_id, granularity.window_for(as_of))?;
        let snapshot = NetWorthService::snapshot(
            user_id,
            &history,
            as_of,
            granularity,
            self.settings.reconciliation_tolerance,
        )?;
        if !self.store.append_snapshot(&snapshot)? {
            debug!(snapshot_id = %snapshot.id, "snapshot already recorded");
        }
        Ok(snapshot)
    }

    // --- routines ------------------------------------------------------------

    /// Flips a routine and its member entries in one store write.
    pub fn toggle_routine(&self, routine_id: Uuid) -> Result<bool, CoreError> {
        let mut routine = self.store.routine(routine_id)?;
        let mut members: Vec<_> = self
            .store
            .entries_for_user(routine.user_id)?
            .into_iter()
            .filter(|e| e.routine_id == Some(routine_id))
            .collect();
        let active = RoutineService::toggle(&mut routine, &mut members, self.clock.now())?;
        let count = members.len();
        self.store.save_routine_with_entries(routine, members)?;
        info!(%routine_id, active, entries = count, "routine toggled");
        Ok(active)
    }

    pub fn assign_to_routine(&self, routine_id: Uuid, entry_id: Uuid) -> Result<(), CoreError> {
        let routine = self.store.routine(routine_id)?;
        let mut entry = self.store.entry(entry_id)?;
        RoutineService::assign(&routine, &mut entry, self.clock.now())?;
        self.store.upsert_entry(entry)
    }

    pub fn routine_totals(&self, routine_id: Uuid) -> Result<RoutineTotals, CoreError> {
        let routine = self.store.routine(routine_id)?;
        let entries = self.store.entries_for_user(routine.user_id)?;
        RoutineService::totals(&routine, &entries)
    }

    // --- accounts ------------------------------------------------------------

    /// Overwrites an account balance outside the posting path.
    pub fn reconcile_account_balance(&self, account_id: Uuid, balance: Decimal) -> Result<Account, CoreError> {
        let account = self.store.account(account_id)?;
        warn!(
            %account_id,
            from = %account.balance,
            to = %balance,
            "manual balance reconciliation"
        );
        self.store.set_account_balance(account_id, balance, self.clock.now())
    }

    // --- scheduling ----------------------------------------------------------

    /// Materializes everything due, rebuilds budgets from the ledger and
    /// records a cumulative snapshot for the user's today.
    ///
    /// Budgets are rebuilt even when materialization fails partway, so
    /// occurrences posted before the failure are never missing from them.
    pub fn daily_pass_for_user(
        &self,
        user_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<UserPassReport, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let today = self.today_for(user_id)?;
        let budgets_rolled = self.roll_budgets_forward(user_id, today)?;
        let materialized = self.materialize_due_for_user(user_id, cancel);
        let rebuilt = self.rebuild_budgets_for_user(user_id);
        let materialized = materialized?;
        rebuilt?;

        let budgets: Vec<_> = self
            .store
            .budgets_for_user(user_id)?
            .into_iter()
            .filter(|b| b.is_active)
            .collect();
        let budget_hits = materialized
            .iter()
            .flat_map(|report| report.created.iter())
            .map(|txn| budgets.iter().filter(|b| BudgetService::counts(b, txn)).count())
            .sum();

        let snapshot = if cancel.is_cancelled() {
            None
        } else {
            Some(self.compute_snapshot(user_id, today, SnapshotGranularity::Daily)?)
        };

        let report = UserPassReport {
            user_id,
            today,
            materialized,
            budgets_rolled,
            budget_hits,
            snapshot,
        };
        info!(
            %user_id,
            %today,
            posted = report.posted(),
            budget_hits,
            "daily pass complete"
        );
        Ok(report)
    }
}
