#![doc(test(attr(deny(warnings))))]

//! Cadence runs recurring income and expense schedules over a persistent
//! ledger: it materializes due occurrences, keeps budgets current and records
//! net worth snapshots.

pub mod errors;
pub mod scheduler;
pub mod utils;

pub use cadence_config;
pub use cadence_core;
pub use cadence_domain;
pub use cadence_storage_json;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(None);
        tracing::info!(build = %utils::build_info::current(), "cadence tracing initialized");
    });
}
