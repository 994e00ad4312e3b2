use std::time::Duration;
use thiserror::Error;

/// Result type for intent-authorization operations.
pub type TapResult<T> = Result<T, TapError>;

/// Result type for ledger interface calls.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type for persistence store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Authorization error taxonomy.
///
/// Local checks short-circuit with the specific variant before any ledger call;
/// ledger failures are carried unmodified inside `LedgerUnavailable`.
#[derive(Debug, Error)]
pub enum TapError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("intent {0} has expired")]
    ExpiredIntent(String),

    #[error("intent {0} was already executed")]
    AlreadyExecuted(String),

    #[error("intent {0} was already revoked")]
    AlreadyRevoked(String),

    #[error("requested amount {requested} exceeds intent maximum {max_amount}")]
    AmountExceeded { requested: u64, max_amount: u64 },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl TapError {
    /// Stable tag for structured results handed to orchestration code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::InvalidKeyMaterial(_) => "InvalidKeyMaterial",
            Self::ExpiredIntent(_) => "ExpiredIntent",
            Self::AlreadyExecuted(_) => "AlreadyExecuted",
            Self::AlreadyRevoked(_) => "AlreadyRevoked",
            Self::AmountExceeded { .. } => "AmountExceeded",
            Self::LedgerUnavailable(_) => "LedgerUnavailable",
            Self::NotFound(_) => "NotFound",
            Self::Storage(_) => "Storage",
        }
    }
}

impl From<LedgerError> for TapError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => Self::NotFound(what),
            other => Self::LedgerUnavailable(other),
        }
    }
}

impl From<StorageError> for TapError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Storage(other),
        }
    }
}

/// Failures reported by (or on the way to) the remote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    #[error("ledger rejected request ({code}): {reason}")]
    Rejected { code: String, reason: String },

    #[error("ledger record not found: {0}")]
    NotFound(String),

    #[error("malformed ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn rejected(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            reason: reason.into(),
        }
    }
}

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_not_found_maps_to_not_found() {
        let err: TapError = LedgerError::NotFound("intent abc".into()).into();
        assert!(matches!(err, TapError::NotFound(_)));
    }

    #[test]
    fn ledger_rejection_keeps_remote_reason() {
        let err: TapError = LedgerError::rejected("AlreadyExecuted", "account settled").into();
        match err {
            TapError::LedgerUnavailable(LedgerError::Rejected { code, reason }) => {
                assert_eq!(code, "AlreadyExecuted");
                assert_eq!(reason, "account settled");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn storage_errors_keep_their_kind() {
        let err: TapError = StorageError::Backend("disk full".into()).into();
        assert_eq!(err.kind(), "Storage");
        let err: TapError = StorageError::NotFound("agent x".into()).into();
        assert_eq!(err.kind(), "NotFound");
    }
}
