use std::sync::Arc;

use cadence_core::{CancellationToken, CoreError, Engine, EngineSettings, FixedClock, LedgerStore};
use cadence_domain::{Account, Category, DateWindow, Entry, FlowKind, Recurrence, User};
use cadence_storage_json::JsonLedgerStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs;
use tempfile::tempdir;

struct Seeded {
    user: User,
    account: Account,
    rent: Entry,
}

fn seed(store: &JsonLedgerStore, clock: &FixedClock) -> Seeded {
    let now = clock.0;
    let user = User::new("ines@example.com", "Europe/Madrid", "EUR", now).expect("user");
    store.insert_user(user.clone()).expect("insert user");
    let account = Account::new(user.id, "Main", Decimal::new(10_000, 0), now);
    store.insert_account(account.clone()).expect("insert account");
    let housing = Category::new(user.id, "Housing", FlowKind::Expense);
    store.insert_category(housing.clone()).expect("insert category");
    let rent = Entry::new(
        user.id,
        account.id,
        housing.id,
        "Rent",
        FlowKind::Expense,
        Decimal::new(1500, 0),
        Recurrence::monthly(1).expect("rule"),
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        now,
    )
    .expect("entry");
    store.upsert_entry(rent.clone()).expect("insert entry");
    Seeded { user, account, rent }
}

#[test]
fn ledger_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let clock = FixedClock::on(2025, 3, 20).unwrap();
    let seeded = {
        let store = JsonLedgerStore::open(dir.path()).expect("open store");
        let seeded = seed(&store, &clock);
        let engine = Engine::new(Arc::new(store), Arc::new(clock), EngineSettings::default());
        let report = engine
            .materialize_due(seeded.rent.id, &CancellationToken::new())
            .expect("materialize");
        assert_eq!(report.posted(), 3);
        seeded
    };

    let reopened = JsonLedgerStore::open(dir.path()).expect("reopen store");
    let account = reopened.account(seeded.account.id).expect("account");
    assert_eq!(account.balance, Decimal::new(5500, 0));
    let ledger = reopened
        .transactions_for_user(seeded.user.id, DateWindow::through(NaiveDate::MAX))
        .expect("transactions");
    assert_eq!(ledger.len(), 3);
    assert!(reopened
        .has_occurrence(seeded.rent.id, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
        .unwrap());
}

#[test]
fn rematerializing_after_reopen_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let clock = FixedClock::on(2025, 3, 20).unwrap();
    let store = JsonLedgerStore::open(dir.path()).expect("open store");
    let seeded = seed(&store, &clock);
    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
    )
    .unwrap();
    let engine = Engine::new(Arc::new(store), Arc::new(clock), EngineSettings::default());
    engine
        .materialize(seeded.rent.id, window, &CancellationToken::new())
        .expect("first pass");
    drop(engine);

    let store = JsonLedgerStore::open(dir.path()).expect("reopen store");
    let engine = Engine::new(Arc::new(store), Arc::new(clock), EngineSettings::default());
    let again = engine
        .materialize(seeded.rent.id, window, &CancellationToken::new())
        .expect("second pass");
    assert_eq!(again.posted(), 0);
    assert_eq!(again.duplicates_skipped, 3);
    assert_eq!(
        engine.store().account(seeded.account.id).unwrap().balance,
        Decimal::new(5500, 0)
    );
}

#[test]
fn rejected_mutations_leave_the_file_untouched() {
    let dir = tempdir().expect("tempdir");
    let clock = FixedClock::on(2025, 3, 20).unwrap();
    let store = JsonLedgerStore::open(dir.path()).expect("open store");
    let seeded = seed(&store, &clock);
    let before = fs::read_to_string(store.ledger_path()).expect("read ledger");

    let err = store.delete_user(seeded.user.id).unwrap_err();
    assert!(matches!(err, CoreError::UserHasDependents(_)));

    let after = fs::read_to_string(store.ledger_path()).expect("read ledger");
    assert_eq!(before, after);
    assert!(!store.ledger_path().with_extension("json.tmp").exists());
}

#[test]
fn backups_are_listed_restored_and_pruned() {
    let dir = tempdir().expect("tempdir");
    let clock = FixedClock::on(2025, 3, 20).unwrap();
    let store = JsonLedgerStore::with_retention(dir.path(), 1).expect("open store");
    let seeded = seed(&store, &clock);

    let info = store.backup(Some("before pass")).expect("backup");
    assert!(info.id.ends_with("_before-pass.json"));
    assert!(info.created_at.is_some());

    store
        .set_account_balance(seeded.account.id, Decimal::ZERO, clock.0)
        .expect("overwrite balance");
    store.restore_backup(&info).expect("restore");
    assert_eq!(
        store.account(seeded.account.id).unwrap().balance,
        Decimal::new(10_000, 0)
    );

    let backups = store.list_backups().expect("list backups");
    assert_eq!(backups.len(), 1);
    assert!(store.warnings().expect("warnings").is_empty());
}

#[test]
fn backups_in_the_same_second_do_not_overwrite_each_other() {
    let dir = tempdir().expect("tempdir");
    let clock = FixedClock::on(2025, 3, 20).unwrap();
    let store = JsonLedgerStore::open(dir.path()).expect("open store");
    let seeded = seed(&store, &clock);

    let first = store.backup(Some("nightly")).expect("first backup");
    store
        .set_account_balance(seeded.account.id, Decimal::ZERO, clock.0)
        .expect("overwrite balance");
    let second = store.backup(Some("nightly")).expect("second backup");

    assert_ne!(first.id, second.id);
    assert!(first.path.exists());
    assert!(second.path.exists());
    assert_eq!(store.list_backups().expect("list backups").len(), 2);

    store.restore_backup(&first).expect("restore");
    assert_eq!(
        store.account(seeded.account.id).unwrap().balance,
        Decimal::new(10_000, 0)
    );
}
