use std::{env, path::PathBuf, process, sync::Arc};

use chrono::NaiveDate;

use cadence_engine::{
    cadence_config::{Config, ConfigManager},
    cadence_core::{CancellationToken, Clock, Engine, SystemClock},
    cadence_storage_json::JsonLedgerStore,
    errors::EngineError,
    scheduler::{AsOfClock, Scheduler},
    utils::{self, build_info},
};

const EXIT_FAILURES: i32 = 1;
const EXIT_USAGE: i32 = 2;

#[derive(Debug, Default)]
struct RunArgs {
    date: Option<NaiveDate>,
    data_dir: Option<PathBuf>,
    json: bool,
    backup: bool,
}

fn main() {
    let mut args = env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "run".to_string());

    let result = match command.as_str() {
        "run" => parse_run_args(args).and_then(run),
        "backups" => parse_run_args(args).and_then(|opts| list_backups(&opts)),
        "version" => {
            println!("cadence_scheduler {}", build_info::current());
            Ok(0)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(0)
        }
        other => Err(EngineError::InvalidArgument(format!("unknown command `{other}`"))),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(EngineError::InvalidArgument(message)) => {
            eprintln!("Error: {message}");
            print_usage();
            process::exit(EXIT_USAGE);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(EXIT_FAILURES);
        }
    }
}

fn parse_run_args(mut args: impl Iterator<Item = String>) -> Result<RunArgs, EngineError> {
    let mut parsed = RunArgs {
        backup: true,
        ..RunArgs::default()
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--date" => {
                let raw = args
                    .next()
                    .ok_or_else(|| EngineError::InvalidArgument("--date needs a value".into()))?;
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                    EngineError::InvalidArgument(format!("`{raw}` is not a YYYY-MM-DD date"))
                })?;
                parsed.date = Some(date);
            }
            "--data-dir" => {
                let raw = args.next().ok_or_else(|| {
                    EngineError::InvalidArgument("--data-dir needs a value".into())
                })?;
                parsed.data_dir = Some(PathBuf::from(raw));
            }
            "--json" => parsed.json = true,
            "--no-backup" => parsed.backup = false,
            other => {
                return Err(EngineError::InvalidArgument(format!(
                    "unexpected argument `{other}`"
                )))
            }
        }
    }
    Ok(parsed)
}

fn open_store(opts: &RunArgs) -> Result<(JsonLedgerStore, Config), EngineError> {
    let config = ConfigManager::default_location()?.load()?;
    utils::init_tracing(config.log_filter.as_deref());
    let ledger_dir = opts
        .data_dir
        .clone()
        .unwrap_or_else(|| config.resolve_ledger_dir());
    let store = JsonLedgerStore::open(ledger_dir)?;
    for warning in store.warnings()? {
        tracing::warn!(%warning, "ledger integrity");
    }
    Ok((store, config))
}

fn run(opts: RunArgs) -> Result<i32, EngineError> {
    let (store, config) = open_store(&opts)?;
    if opts.backup && store.ledger_path().exists() {
        store.backup(Some("pre-run"))?;
    }

    let clock: Arc<dyn Clock> = match opts.date {
        Some(date) => Arc::new(AsOfClock::new(date)),
        None => Arc::new(SystemClock),
    };
    let engine = Engine::new(Arc::new(store), clock, utils::engine_settings(&config));
    let scheduler = Scheduler::new(Arc::new(engine));
    let summary = scheduler.run_daily(&CancellationToken::new())?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for outcome in &summary.users {
            match &outcome.error {
                None => println!(
                    "{}  posted {}  skipped {}  budget updates {}",
                    outcome.user_id, outcome.posted, outcome.duplicates_skipped, outcome.budget_hits
                ),
                Some(err) => println!("{}  FAILED: {err}", outcome.user_id),
            }
        }
        println!(
            "{} user(s), {} posted, {} failed",
            summary.users.len(),
            summary.posted(),
            summary.failures()
        );
    }

    Ok(if summary.failures() == 0 { 0 } else { EXIT_FAILURES })
}

fn list_backups(opts: &RunArgs) -> Result<i32, EngineError> {
    let (store, _) = open_store(opts)?;
    let backups = store.list_backups()?;
    if backups.is_empty() {
        println!("No backups found.");
    }
    for backup in backups {
        match backup.created_at {
            Some(at) => println!("{}  {}", at.format("%Y-%m-%d %H:%M:%S"), backup.id),
            None => println!("{}", backup.id),
        }
    }
    Ok(0)
}

fn print_usage() {
    eprintln!(
        "Usage: cadence_scheduler <command>\n\
         Commands:\n  \
         run [--date YYYY-MM-DD] [--data-dir <dir>] [--json] [--no-backup]\n  \
         backups [--data-dir <dir>]\n  \
         version"
    );
}
