use cadence_domain::{DomainError, FlowKind};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("Account {account_id} does not belong to the owner of entry {entry_id}")]
    AccountMismatch { entry_id: Uuid, account_id: Uuid },
    #[error("Ownership violation: {0}")]
    OwnershipViolation(String),
    #[error("Category {category_id} is {category_kind} but the record is {record_kind}")]
    CategoryTypeMismatch {
        category_id: Uuid,
        category_kind: FlowKind,
        record_kind: FlowKind,
    },
    #[error("Snapshot {snapshot_id} drifts by {drift} from income minus expense")]
    ReconciliationFailure { snapshot_id: Uuid, drift: Decimal },
    #[error("Budget {candidate} overlaps category {category_id} already tracked by budget {existing}")]
    OverlappingBudget {
        candidate: Uuid,
        existing: Uuid,
        category_id: Uuid,
    },
    #[error("Entry {entry_id} already belongs to routine {routine_id}")]
    EntryAlreadyInRoutine { entry_id: Uuid, routine_id: Uuid },
    #[error("User {0} still owns records")]
    UserHasDependents(Uuid),
    #[error("User not found: {0}")]
    UserNotFound(Uuid),
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),
    #[error("Entry not found: {0}")]
    EntryNotFound(Uuid),
    #[error("Budget not found: {0}")]
    BudgetNotFound(Uuid),
    #[error("Routine not found: {0}")]
    RoutineNotFound(Uuid),
    #[error("Timed out waiting for lock on {0}")]
    LockTimeout(Uuid),
    #[error("Store temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Transient failures that may succeed when re-attempted after the idempotency check.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::StoreUnavailable(_) | CoreError::LockTimeout(_)
        )
    }
}
