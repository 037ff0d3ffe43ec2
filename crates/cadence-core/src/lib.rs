//! cadence-core
//!
//! Scheduling, materialization, and aggregation services.
//! Depends on cadence-domain. Persistence is reached only through [`LedgerStore`].

pub mod budget_service;
pub mod concurrency;
pub mod engine;
pub mod error;
pub mod materialize_service;
pub mod net_worth_service;
pub mod recurrence_service;
pub mod routine_service;
pub mod schedule_service;
pub mod settings;
pub mod state;
pub mod storage;
pub mod time;


pub use budget_service::*;
pub use concurrency::*;
pub use engine::*;
pub use error::CoreError;
pub use materialize_service::*;
pub use net_worth_service::*;
pub use recurrence_service::*;
pub use routine_service::*;
pub use schedule_service::*;
pub use settings::EngineSettings;
pub use state::LedgerState;
pub use storage::{LedgerStore, MemoryStore, PostOutcome};
pub use time::*;
