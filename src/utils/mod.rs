pub mod build_info;

use std::{sync::Once, time::Duration};

use cadence_config::Config;
use cadence_core::EngineSettings;

static TRACING_INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "cadence_engine=info,cadence_core=info,cadence_storage_json=info";

/// Initializes the global tracing subscriber. `RUST_LOG` takes precedence over
/// `directives`, which in turn replace the built-in default.
pub fn init_tracing(directives: Option<&str>) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(directives.unwrap_or(DEFAULT_FILTER)))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
    });
}

/// Engine tunables derived from persisted configuration.
pub fn engine_settings(config: &Config) -> EngineSettings {
    EngineSettings {
        near_limit_percent: config.near_limit_percent,
        reconciliation_tolerance: config.reconciliation_tolerance,
        max_retries: config.max_retries,
        max_occurrences_per_pass: config.max_occurrences_per_pass,
        lock_timeout: Duration::from_secs(config.lock_timeout_secs),
    }
}
