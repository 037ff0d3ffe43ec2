use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{paths, ConfigError};

/// Engine-wide settings persisted as `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Spent percentage at or above which a budget is reported as near its limit.
    #[serde(default = "Config::default_near_limit_percent")]
    pub near_limit_percent: Decimal,
    #[serde(default = "Config::default_reconciliation_tolerance")]
    pub reconciliation_tolerance: Decimal,
    #[serde(default = "Config::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "Config::default_max_occurrences_per_pass")]
    pub max_occurrences_per_pass: usize,
    #[serde(default = "Config::default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    /// `tracing` filter directives; `RUST_LOG` wins when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom data directory. Defaults to `$CADENCE_HOME` or `~/.cadence`.
    pub data_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            near_limit_percent: Self::default_near_limit_percent(),
            reconciliation_tolerance: Self::default_reconciliation_tolerance(),
            max_retries: Self::default_max_retries(),
            max_occurrences_per_pass: Self::default_max_occurrences_per_pass(),
            lock_timeout_secs: Self::default_lock_timeout_secs(),
            log_filter: None,
            data_root: None,
        }
    }
}

impl Config {
    pub fn default_near_limit_percent() -> Decimal {
        Decimal::new(80, 0)
    }

    pub fn default_reconciliation_tolerance() -> Decimal {
        Decimal::new(1, 2)
    }

    pub fn default_max_retries() -> u32 {
        3
    }

    pub fn default_max_occurrences_per_pass() -> usize {
        1024
    }

    pub fn default_lock_timeout_secs() -> u64 {
        30
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.near_limit_percent <= Decimal::ZERO || self.near_limit_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::Invalid(format!(
                "near_limit_percent {} is outside (0, 100]",
                self.near_limit_percent
            )));
        }
        if self.reconciliation_tolerance < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "reconciliation_tolerance must not be negative".into(),
            ));
        }
        if self.max_occurrences_per_pass == 0 {
            return Err(ConfigError::Invalid(
                "max_occurrences_per_pass must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn resolve_data_root(&self) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }
        paths::app_data_dir()
    }

    pub fn resolve_ledger_dir(&self) -> PathBuf {
        paths::ledger_dir_in(&self.resolve_data_root())
    }
}
