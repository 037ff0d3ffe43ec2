use std::time::Duration;

use rust_decimal::Decimal;

const MAX_OCCURRENCES_PER_PASS: usize = 1024;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;

/// Tunables shared by every engine operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// `spent_percentage` at or above which a budget counts as near its limit.
    pub near_limit_percent: Decimal,
    /// Maximum allowed gap between `net_worth` and `income - expense`.
    pub reconciliation_tolerance: Decimal,
    /// Retries for a single occurrence after a transient store failure.
    pub max_retries: u32,
    /// Upper bound on occurrences posted per entry in one pass; the next pass resumes.
    pub max_occurrences_per_pass: usize,
    pub lock_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            near_limit_percent: Decimal::new(80, 0),
            reconciliation_tolerance: Decimal::new(1, 2),
            max_retries: DEFAULT_MAX_RETRIES,
            max_occurrences_per_pass: MAX_OCCURRENCES_PER_PASS,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
        }
    }
}
