pub mod availability;
pub mod booking;
pub mod customer;
pub mod hold;
pub mod memory;
pub mod repository;
pub mod session;
pub mod tenant;
pub mod time;

use serde::Serialize;

/// Why a slot could not be taken. Holds are an advisory pre-check; only a
/// confirmed (or requested) appointment is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSource {
    HeldByOther,
    ConfirmedAppointment,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Terms and conditions must be accepted")]
    TermsNotAccepted,
    #[error("Tenant not found")]
    TenantNotFound,
    #[error("Online booking is not available for this tenant")]
    BookingDisabled,
    #[error("Hold not found")]
    HoldNotFound,
    #[error("Hold expired")]
    HoldExpired,
    #[error("Slot no longer available ({conflict:?})")]
    SlotConflict {
        conflict: ConflictSource,
        retry_after: Option<u64>,
    },
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn conflict(conflict: ConflictSource) -> Self {
        CoreError::SlotConflict {
            conflict,
            retry_after: None,
        }
    }

    /// True when the caller should pick another slot and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::SlotConflict { .. })
    }
}

impl From<repository::StoreError> for CoreError {
    fn from(err: repository::StoreError) -> Self {
        match err {
            repository::StoreError::Conflict(_) => {
                CoreError::conflict(ConflictSource::ConfirmedAppointment)
            }
            repository::StoreError::Backend(msg) => CoreError::InternalError(msg),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
