use assert_cmd::Command;
use chrono::{NaiveDate, Utc};
use predicates::str::contains;
use rust_decimal::Decimal;
use tempfile::TempDir;

use cadence_engine::{
    cadence_core::LedgerStore,
    cadence_domain::{Account, Category, Entry, FlowKind, Recurrence, User},
    cadence_storage_json::JsonLedgerStore,
};

fn scheduler(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cadence_scheduler").unwrap();
    cmd.env("CADENCE_HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

fn seed_ledger(home: &TempDir) {
    let store = JsonLedgerStore::open(home.path().join("ledger")).unwrap();
    let now = Utc::now();
    let user = User::new("ana@example.com", "Europe/Lisbon", "EUR", now).unwrap();
    store.insert_user(user.clone()).unwrap();
    let account = Account::new(user.id, "Checking", Decimal::new(2_000, 0), now);
    store.insert_account(account.clone()).unwrap();
    let salary = Category::new(user.id, "Salary", FlowKind::Income);
    store.insert_category(salary.clone()).unwrap();
    let pay = Entry::new(
        user.id,
        account.id,
        salary.id,
        "Salary",
        FlowKind::Income,
        Decimal::new(3_000, 0),
        Recurrence::monthly(25).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 25).unwrap(),
        now,
    )
    .unwrap();
    store.upsert_entry(pay).unwrap();
}

#[test]
fn run_on_an_empty_home_reports_no_users() {
    let home = TempDir::new().unwrap();
    scheduler(&home)
        .args(["run", "--date", "2025-03-15"])
        .assert()
        .success()
        .stdout(contains("0 user(s), 0 posted, 0 failed"));
}

#[test]
fn run_materializes_the_seeded_ledger() {
    let home = TempDir::new().unwrap();
    seed_ledger(&home);

    scheduler(&home)
        .args(["run", "--date", "2025-03-30", "--json"])
        .assert()
        .success()
        .stdout(contains("\"posted\": 3"))
        .stdout(contains("\"net_worth\": \"9000\""));

    let json = std::fs::read_to_string(home.path().join("ledger").join("ledger.json")).unwrap();
    assert!(json.contains("2025-03-25"));

    scheduler(&home)
        .args(["run", "--date", "2025-03-30"])
        .assert()
        .success()
        .stdout(contains("1 user(s), 0 posted, 0 failed"));
}

#[test]
fn runs_leave_a_backup_behind() {
    let home = TempDir::new().unwrap();
    seed_ledger(&home);

    scheduler(&home)
        .args(["run", "--date", "2025-02-01"])
        .assert()
        .success();

    scheduler(&home)
        .arg("backups")
        .assert()
        .success()
        .stdout(contains("ledger_"));
}

#[test]
fn malformed_date_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    scheduler(&home)
        .args(["run", "--date", "15/03/2025"])
        .assert()
        .code(2)
        .stderr(contains("not a YYYY-MM-DD date"));
}

#[test]
fn unknown_command_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    scheduler(&home)
        .arg("rewind")
        .assert()
        .code(2)
        .stderr(contains("Usage: cadence_scheduler"));
}

#[test]
fn version_prints_build_metadata() {
    let home = TempDir::new().unwrap();
    scheduler(&home)
        .arg("version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}
