use std::{env, path::PathBuf};

use dirs::home_dir;

const DEFAULT_DIR_NAME: &str = ".cadence";
const HOME_ENV: &str = "CADENCE_HOME";
const LEDGER_DIR: &str = "ledger";

/// Application data directory: `$CADENCE_HOME` when set, otherwise `~/.cadence`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_ENV) {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Directory holding the JSON ledger under `base`.
pub fn ledger_dir_in(base: &std::path::Path) -> PathBuf {
    base.join(LEDGER_DIR)
}
