//! Daily pass across every user, one thread per user.

use std::{sync::Arc, thread};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use cadence_core::{CancellationToken, Clock, CoreError, Engine, UserPassReport};

/// Clock that reports one fixed calendar date in every zone.
#[derive(Debug, Clone, Copy)]
pub struct AsOfClock {
    date: NaiveDate,
}

impl AsOfClock {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl Clock for AsOfClock {
    fn now(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(12, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or_else(Utc::now)
    }

    fn today_in(&self, _tz: Tz) -> NaiveDate {
        self.date
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserOutcome {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
    pub posted: usize,
    pub duplicates_skipped: usize,
    pub budget_hits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_worth: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserOutcome {
    fn succeeded(report: &UserPassReport) -> Self {
        Self {
            user_id: report.user_id,
            today: Some(report.today),
            posted: report.posted(),
            duplicates_skipped: report
                .materialized
                .iter()
                .map(|m| m.duplicates_skipped)
                .sum(),
            budget_hits: report.budget_hits,
            net_worth: report.snapshot.as_ref().map(|s| s.net_worth),
            error: None,
        }
    }

    fn failed(user_id: Uuid, error: String) -> Self {
        Self {
            user_id,
            today: None,
            posted: 0,
            duplicates_skipped: 0,
            budget_hits: 0,
            net_worth: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub users: Vec<UserOutcome>,
}

impl RunSummary {
    pub fn failures(&self) -> usize {
        self.users.iter().filter(|u| !u.is_ok()).count()
    }

    pub fn posted(&self) -> usize {
        self.users.iter().map(|u| u.posted).sum()
    }
}

pub struct Scheduler {
    engine: Arc<Engine>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Runs the daily pass for every user in parallel. A failing user is
    /// recorded in its outcome and never stops the others.
    pub fn run_daily(&self, cancel: &CancellationToken) -> Result<RunSummary, CoreError> {
        let users = self.engine.store().users()?;
        info!(users = users.len(), "starting daily pass");

        let engine = self.engine.as_ref();
        let users = thread::scope(|scope| {
            let handles: Vec<_> = users
                .iter()
                .map(|user| {
                    let user_id = user.id;
                    (
                        user_id,
                        scope.spawn(move || engine.daily_pass_for_user(user_id, cancel)),
                    )
                })
                .collect();

            handles
                .into_iter()
                .map(|(user_id, handle)| match handle.join() {
                    Ok(Ok(report)) => UserOutcome::succeeded(&report),
                    Ok(Err(err)) => {
                        warn!(%user_id, error = %err, "daily pass failed for user");
                        UserOutcome::failed(user_id, err.to_string())
                    }
                    Err(_) => {
                        error!(%user_id, "daily pass panicked");
                        UserOutcome::failed(user_id, "daily pass panicked".into())
                    }
                })
                .collect::<Vec<_>>()
        });

        let summary = RunSummary { users };
        info!(
            posted = summary.posted(),
            failures = summary.failures(),
            "daily pass finished"
        );
        Ok(summary)
    }
}
