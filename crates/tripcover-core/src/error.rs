use thiserror::Error;
use uuid::Uuid;

use tripcover_shared::MemberId;
use tripcover_store::StoreError;

/// Errors produced by the coverage engine.
///
/// Every variant except [`CoreError::Storage`] is raised before any write, so
/// a failed operation leaves no state change and no history event behind.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A trip, member or claim id is absent from the store.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// Not enough unallocated ledger balance to seat another traveler.
    #[error("insufficient balance: a seat costs {required} cents, {available} cents unallocated")]
    Capacity { required: i64, available: i64 },

    /// The member cannot take part in the requested coverage change.
    #[error("member {0} is not eligible for this coverage change")]
    NotEligible(MemberId),

    /// Malformed input, rejected before any side effect.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying persistence failure, propagated unmodified.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
