//! Handler Error Types
//!
//! Failures of the transfer, ledger and wallet handlers. Each variant keeps the
//! store error that caused it, so callers can still tell a missing wallet from
//! an unavailable database.

use thiserror::Error;

use crate::domain::Balance;
use crate::storage::StoreError;

/// Coarse classification used by the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must change the input
    Client,
    /// Wallet or transaction does not exist
    Lookup,
    /// Store-side failure; retryable in principle, never retried here
    Server,
    /// Ledger may be unbalanced and needs manual reconciliation
    Inconsistency,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to look up {target}: {source}")]
    LookupFailed {
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("Lack of currency: balance {balance} is less than {amount}")]
    LackOfCurrency { balance: Balance, amount: Balance },

    #[error("Balance of wallet {address} would overflow")]
    BalanceOverflow { address: String },

    #[error("Failed to update {step}: {source}")]
    UpdateFailed {
        step: &'static str,
        #[source]
        source: StoreError,
    },

    /// The compensating re-credit failed after a failed credit
    #[error("Rollback of wallet {address} failed after credit error {credit_error}: {source}")]
    RollbackFailed {
        address: String,
        credit_error: StoreError,
        #[source]
        source: StoreError,
    },

    /// `outcome` is the error the attempt itself ended with, if any
    #[error("Failed to insert {target}: {source}")]
    InsertFailed {
        target: String,
        #[source]
        source: StoreError,
        outcome: Option<Box<HandlerError>>,
    },

    #[error("Failed to query transactions: {0}")]
    QueryFailed(#[source] StoreError),
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::LackOfCurrency { .. }
            | Self::BalanceOverflow { .. } => ErrorKind::Client,
            Self::LookupFailed { source, .. } if source.is_client_error() => ErrorKind::Lookup,
            Self::RollbackFailed { .. } => ErrorKind::Inconsistency,
            Self::InsertFailed {
                outcome: Some(outcome),
                ..
            } if outcome.kind() == ErrorKind::Inconsistency => ErrorKind::Inconsistency,
            Self::LookupFailed { .. }
            | Self::UpdateFailed { .. }
            | Self::InsertFailed { .. }
            | Self::QueryFailed(_) => ErrorKind::Server,
        }
    }

    /// Store error behind this failure, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::LookupFailed { source, .. }
            | Self::UpdateFailed { source, .. }
            | Self::RollbackFailed { source, .. }
            | Self::InsertFailed { source, .. }
            | Self::QueryFailed(source) => Some(source),
            Self::InvalidRequest(_)
            | Self::LackOfCurrency { .. }
            | Self::BalanceOverflow { .. } => None,
        }
    }

    /// Whether the caller's cancellation token ended the operation
    pub fn is_cancelled(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_cancelled)
    }
}
