//! Grouping and bulk activation of entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use cadence_domain::{DateWindow, DomainError, Entry, FlowKind, Routine};

use crate::{schedule_service::ScheduleService, CoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutineTotals {
    pub total_income: Decimal,
    pub total_expense: Decimal,
}

impl RoutineTotals {
    pub fn net(&self) -> Decimal {
        self.total_income - self.total_expense
    }

    fn add(&mut self, kind: FlowKind, amount: Decimal) -> Result<(), CoreError> {
        let total = match kind {
            FlowKind::Income => &mut self.total_income,
            FlowKind::Expense => &mut self.total_expense,
        };
        *total = total
            .checked_add(amount)
            .ok_or_else(|| DomainError::AmountOverflow(format!("routine {kind} total")))?;
        Ok(())
    }
}

pub struct RoutineService;

impl RoutineService {
    pub fn members<'a>(routine: &Routine, entries: &'a [Entry]) -> Vec<&'a Entry> {
        entries
            .iter()
            .filter(|e| e.routine_id == Some(routine.id))
            .collect()
    }

    /// Nominal per-occurrence amounts of the member entries, split by kind.
    /// Reads entry templates only.
    pub fn totals(routine: &Routine, entries: &[Entry]) -> Result<RoutineTotals, CoreError> {
        let mut totals = RoutineTotals::default();
        for entry in Self::members(routine, entries) {
            totals.add(entry.kind, entry.amount)?;
        }
        Ok(totals)
    }

    /// What the members would post inside `window`, counting each scheduled
    /// occurrence. Inactive members are included so a paused routine can be previewed.
    pub fn projected_totals(
        routine: &Routine,
        entries: &[Entry],
        window: DateWindow,
    ) -> Result<RoutineTotals, CoreError> {
        let mut totals = RoutineTotals::default();
        for entry in Self::members(routine, entries) {
            let count = ScheduleService::project(entry, window.start, window.end).count();
            let amount = entry.amount.checked_mul(Decimal::from(count)).ok_or_else(|| {
                DomainError::AmountOverflow(format!("{count} occurrences of entry {}", entry.id))
            })?;
            totals.add(entry.kind, amount)?;
        }
        Ok(totals)
    }

    /// Flips the routine and propagates the new state to every member.
    /// Transactions and balances are left alone.
    pub fn toggle(
        routine: &mut Routine,
        entries: &mut [Entry],
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let target = !routine.is_active;
        Self::set_active(routine, entries, target, now)?;
        Ok(target)
    }

    pub fn set_active(
        routine: &mut Routine,
        entries: &mut [Entry],
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if let Some(foreign) = entries
            .iter()
            .find(|e| e.routine_id == Some(routine.id) && e.user_id != routine.user_id)
        {
            return Err(CoreError::OwnershipViolation(format!(
                "entry {} in routine {} is owned by another user",
                foreign.id, routine.id
            )));
        }
        routine.is_active = active;
        routine.updated_at = now;
        for entry in entries
            .iter_mut()
            .filter(|e| e.routine_id == Some(routine.id))
        {
            entry.is_active = active;
            entry.updated_at = now;
        }
        Ok(())
    }

    /// Adds `entry` to `routine`. An entry belongs to at most one routine.
    pub fn assign(
        routine: &Routine,
        entry: &mut Entry,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if entry.user_id != routine.user_id {
            return Err(CoreError::OwnershipViolation(format!(
                "entry {} and routine {} have different owners",
                entry.id, routine.id
            )));
        }
        match entry.routine_id {
            Some(current) if current == routine.id => Ok(()),
            Some(current) => Err(CoreError::EntryAlreadyInRoutine {
                entry_id: entry.id,
                routine_id: current,
            }),
            None => {
                entry.routine_id = Some(routine.id);
                entry.updated_at = now;
                Ok(())
            }
        }
    }

    pub fn unassign(entry: &mut Entry, now: DateTime<Utc>) -> bool {
        let was_member = entry.routine_id.take().is_some();
        if was_member {
            entry.updated_at = now;
        }
        was_member
    }
}
