pub mod clock;
pub mod identity;
pub mod ledger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{Caller, MemoryUserDirectory, Role, User, UserDirectory};
pub use ledger::{EscrowView, LedgerError, LedgerReceipt, SettlementLedger};

/// Failure kinds surfaced to callers. Codes are stable and appear in API bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    InvalidTransition,
    InsufficientQuantity,
    GracePeriodExpired,
    ExternalLedgerError,
    Conflict,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::InsufficientQuantity => "INSUFFICIENT_QUANTITY",
            ErrorKind::GracePeriodExpired => "GRACE_PERIOD_EXPIRED",
            ErrorKind::ExternalLedgerError => "EXTERNAL_LEDGER_ERROR",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Storage => "STORAGE",
        }
    }

    /// Only ledger failures are retryable; local state is untouched by them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ExternalLedgerError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation not allowed: {0}")]
    InvalidState(String),

    #[error("Insufficient quantity: requested {requested}, available {available}")]
    InsufficientQuantity { requested: u64, available: u64 },

    #[error("Grace period for cancellation expired at {deadline}")]
    GracePeriodExpired { deadline: chrono::DateTime<chrono::Utc> },

    #[error("Settlement ledger error: {0}")]
    Ledger(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl TradeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradeError::Validation(_) => ErrorKind::Validation,
            TradeError::NotFound(_) => ErrorKind::NotFound,
            TradeError::Forbidden(_) => ErrorKind::Forbidden,
            TradeError::InvalidTransition { .. } | TradeError::InvalidState(_) => {
                ErrorKind::InvalidTransition
            }
            TradeError::InsufficientQuantity { .. } => ErrorKind::InsufficientQuantity,
            TradeError::GracePeriodExpired { .. } => ErrorKind::GracePeriodExpired,
            TradeError::Ledger(_) => ErrorKind::ExternalLedgerError,
            TradeError::Conflict(_) => ErrorKind::Conflict,
            TradeError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        TradeError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<LedgerError> for TradeError {
    fn from(err: LedgerError) -> Self {
        TradeError::Ledger(err.to_string())
    }
}

pub type TradeResult<T> = Result<T, TradeError>;
