use std::sync::Arc;

use chrono::{NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tempfile::tempdir;

use cadence_engine::{
    cadence_core::{
        CancellationToken, Clock, Engine, EngineSettings, LedgerState, LedgerStore, MemoryStore,
    },
    cadence_domain::{Account, Category, DateWindow, Entry, FlowKind, Recurrence, User},
    cadence_storage_json::JsonLedgerStore,
    init,
    scheduler::{AsOfClock, Scheduler},
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Seeds a user with a checking account and a monthly rent of 1200 due on the 1st.
fn seed_user(store: &dyn LedgerStore, email: &str, tz: &str) -> User {
    let now = Utc::now();
    let user = User::new(email, tz, "EUR", now).unwrap();
    store.insert_user(user.clone()).unwrap();
    let account = Account::new(user.id, "Checking", Decimal::new(5_000, 0), now);
    store.insert_account(account.clone()).unwrap();
    let housing = Category::new(user.id, "Housing", FlowKind::Expense);
    store.insert_category(housing.clone()).unwrap();
    let rent = Entry::new(
        user.id,
        account.id,
        housing.id,
        "Rent",
        FlowKind::Expense,
        Decimal::new(1_200, 0),
        Recurrence::monthly(1).unwrap(),
        date(2025, 1, 1),
        now,
    )
    .unwrap();
    store.upsert_entry(rent).unwrap();
    user
}

fn scheduler_on(store: Arc<dyn LedgerStore>, today: NaiveDate) -> Scheduler {
    let engine = Engine::new(store, Arc::new(AsOfClock::new(today)), EngineSettings::default());
    Scheduler::new(Arc::new(engine))
}

#[test]
fn as_of_clock_reports_the_same_date_in_every_zone() {
    let clock = AsOfClock::new(date(2025, 3, 15));
    assert_eq!(clock.today_in(Tz::Pacific__Auckland), date(2025, 3, 15));
    assert_eq!(clock.today_in(Tz::Pacific__Honolulu), date(2025, 3, 15));
    assert_eq!(clock.today(), date(2025, 3, 15));
}

#[test]
fn daily_run_posts_due_occurrences_for_every_user() {
    init();
    let store = Arc::new(MemoryStore::new());
    let ana = seed_user(store.as_ref(), "ana@example.com", "Europe/Lisbon");
    let kai = seed_user(store.as_ref(), "kai@example.com", "Pacific/Auckland");

    let scheduler = scheduler_on(store.clone(), date(2025, 3, 15));
    let summary = scheduler.run_daily(&CancellationToken::new()).unwrap();

    assert_eq!(summary.users.len(), 2);
    assert_eq!(summary.failures(), 0);
    assert_eq!(summary.posted(), 6);
    for user in [&ana, &kai] {
        let outcome = summary.users.iter().find(|o| o.user_id == user.id).unwrap();
        assert_eq!(outcome.posted, 3);
        assert_eq!(outcome.net_worth, Some(Decimal::new(-3_600, 0)));

        let accounts = store.accounts_for_user(user.id).unwrap();
        assert_eq!(accounts[0].balance, Decimal::new(1_400, 0));
    }
}

#[test]
fn repeated_runs_post_nothing_new() {
    let store = Arc::new(MemoryStore::new());
    let ana = seed_user(store.as_ref(), "ana@example.com", "Europe/Lisbon");
    let scheduler = scheduler_on(store.clone(), date(2025, 3, 15));

    scheduler.run_daily(&CancellationToken::new()).unwrap();
    let second = scheduler.run_daily(&CancellationToken::new()).unwrap();

    assert_eq!(second.posted(), 0);
    assert_eq!(second.users[0].duplicates_skipped, 3);
    let everything = DateWindow::new(date(2024, 1, 1), date(2026, 1, 1)).unwrap();
    assert_eq!(store.transactions_for_user(ana.id, everything).unwrap().len(), 3);
    assert_eq!(store.snapshots_for_user(ana.id).unwrap().len(), 1);
}

#[test]
fn one_failing_user_does_not_stop_the_others() {
    let store = MemoryStore::new();
    let healthy = seed_user(&store, "ana@example.com", "Europe/Lisbon");
    let mut state: LedgerState = store.export().unwrap();

    let mut broken = User::new("lost@example.com", "UTC", "EUR", Utc::now()).unwrap();
    broken.timezone = "Mars/Olympus_Mons".into();
    state.users.insert(broken.id, broken.clone());
    let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::from_state(state));

    let summary = scheduler_on(store, date(2025, 3, 15))
        .run_daily(&CancellationToken::new())
        .unwrap();

    assert_eq!(summary.failures(), 1);
    let failed = summary.users.iter().find(|o| o.user_id == broken.id).unwrap();
    assert!(failed.error.is_some());
    let ok = summary.users.iter().find(|o| o.user_id == healthy.id).unwrap();
    assert!(ok.is_ok());
    assert_eq!(ok.posted, 3);
}

#[test]
fn cancelled_run_reports_every_user_as_failed() {
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), "ana@example.com", "Europe/Lisbon");
    let token = CancellationToken::new();
    token.cancel();

    let summary = scheduler_on(store, date(2025, 3, 15)).run_daily(&token).unwrap();

    assert_eq!(summary.posted(), 0);
    assert_eq!(summary.failures(), 1);
}

#[test]
fn json_ledger_keeps_scheduled_work_across_runs() {
    let dir = tempdir().unwrap();
    let ana = {
        let store = Arc::new(JsonLedgerStore::open(dir.path()).unwrap());
        let ana = seed_user(store.as_ref(), "ana@example.com", "Europe/Lisbon");
        let summary = scheduler_on(store, date(2025, 2, 10))
            .run_daily(&CancellationToken::new())
            .unwrap();
        assert_eq!(summary.posted(), 2);
        ana
    };

    let store = Arc::new(JsonLedgerStore::open(dir.path()).unwrap());
    let summary = scheduler_on(store.clone(), date(2025, 4, 2))
        .run_daily(&CancellationToken::new())
        .unwrap();
    assert_eq!(summary.posted(), 2);

    let everything = DateWindow::new(date(2025, 1, 1), date(2025, 12, 31)).unwrap();
    let dates: Vec<_> = store
        .transactions_for_user(ana.id, everything)
        .unwrap()
        .into_iter()
        .map(|t| t.date)
        .collect();
    assert_eq!(
        dates,
        vec![date(2025, 1, 1), date(2025, 2, 1), date(2025, 3, 1), date(2025, 4, 1)]
    );
}

#[test]
fn weekly_schedule_runs_through_the_scheduler() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let user = User::new("lee@example.com", "UTC", "USD", now).unwrap();
    store.insert_user(user.clone()).unwrap();
    let account = Account::new(user.id, "Wallet", Decimal::ZERO, now);
    store.insert_account(account.clone()).unwrap();
    let pay = Category::new(user.id, "Tutoring", FlowKind::Income);
    store.insert_category(pay.clone()).unwrap();
    let lessons = Entry::new(
        user.id,
        account.id,
        pay.id,
        "Lessons",
        FlowKind::Income,
        Decimal::new(40, 0),
        Recurrence::weekly([Weekday::Tue, Weekday::Thu]).unwrap(),
        date(2025, 3, 3),
        now,
    )
    .unwrap();
    store.upsert_entry(lessons).unwrap();

    let summary = scheduler_on(store.clone(), date(2025, 3, 16))
        .run_daily(&CancellationToken::new())
        .unwrap();

    assert_eq!(summary.posted(), 4);
    assert_eq!(
        store.account(account.id).unwrap().balance,
        Decimal::new(160, 0)
    );
}
