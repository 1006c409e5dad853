//! Error types for the hotel ledger client
//!
//! Two layers:
//! - `LedgerError`: failures reported by the external capabilities
//!   (RPC transport, wallet)
//! - `ClientError`: the taxonomy surfaced to callers of this layer

use thiserror::Error;

/// Failure reported by an external ledger capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Network or RPC transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger refused to execute the call (dry run or real execution)
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The wallet refused to sign or the node refused to accept the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The transport gave up waiting
    #[error("timed out: {0}")]
    Timeout(String),
}

/// Client library error type
#[derive(Error, Debug)]
pub enum ClientError {
    /// Deploy-state transition out of order, or write on a non-deployed/obsolete entity
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The ledger rejected a dry-run cost estimate (the call would most likely revert)
    #[error("Gas estimation failed for {method}: {source}")]
    Estimation {
        method: String,
        #[source]
        source: LedgerError,
    },

    /// Signing or broadcast failed
    #[error("Submission failed for {method}: {source}")]
    Submission {
        method: String,
        #[source]
        source: LedgerError,
    },

    /// Lookup by address or id failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required field missing, or a supplied value fails domain validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller's manager identity does not match the registered manager
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Read-only call or event fetch failed
    #[error("Ledger call failed: {0}")]
    Ledger(#[from] LedgerError),

    /// Return values do not have the shape the contract interface promises
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn authorization(reason: impl Into<String>) -> Self {
        Self::Authorization(reason.into())
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }

    pub fn estimation(method: impl Into<String>, source: LedgerError) -> Self {
        Self::Estimation {
            method: method.into(),
            source,
        }
    }

    pub fn submission(method: impl Into<String>, source: LedgerError) -> Self {
        Self::Submission {
            method: method.into(),
            source,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_estimation_error_chains_cause() {
        let err = ClientError::estimation("registerHotel", LedgerError::Reverted("out of gas".into()));
        assert_eq!(
            err.to_string(),
            "Gas estimation failed for registerHotel: execution reverted: out of gas"
        );

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "execution reverted: out of gas");
    }

    #[test]
    fn test_ledger_error_converts() {
        let err: ClientError = LedgerError::Transport("connection reset".into()).into();
        assert!(matches!(err, ClientError::Ledger(LedgerError::Transport(_))));
    }
}
