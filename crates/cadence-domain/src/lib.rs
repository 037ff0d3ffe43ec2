//! cadence-domain
//!
//! Pure domain records (User, Account, Category, Entry, Transaction, Budget,
//! Routine, NetWorthSnapshot) plus the recurrence value type.
//! No I/O, no storage, no clock. Only data types, invariants, and calendar math.

pub mod account;
pub mod budget;
pub mod category;
pub mod common;
pub mod entry;
pub mod error;
pub mod recurrence;
pub mod routine;
pub mod snapshot;
pub mod transaction;
pub mod user;

pub use account::*;
pub use budget::*;
pub use category::*;
pub use common::*;
pub use entry::*;
pub use error::DomainError;
pub use recurrence::*;
pub use routine::*;
pub use snapshot::*;
pub use transaction::*;
pub use user::*;
