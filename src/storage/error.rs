//! Storage Errors
//!
//! Error types for wallet and transaction store operations.

/// Errors that can occur in a wallet or transaction store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row matched the lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// Wallet address already taken
    #[error("Duplicate wallet address: {0}")]
    DuplicateAddress(String),

    /// Address is not a valid wallet address
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Query limit below 1
    #[error("Limit must be greater than zero (got {0})")]
    InvalidLimit(i64),

    /// Caller cancelled before the operation produced a result
    #[error("Storage operation cancelled")]
    Cancelled,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row could not be turned back into a domain value
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Store or gate is not accepting work
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Operation not offered by this store
    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateAddress(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled)
    }

    /// Caller-caused failures: retrying the same input cannot succeed
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::DuplicateAddress(_)
                | StoreError::InvalidAddress(_)
                | StoreError::InvalidLimit(_)
        )
    }

    /// Store-side failures: retryable in principle, never retried here
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_)
                | StoreError::Corrupt(_)
                | StoreError::Unavailable(_)
                | StoreError::Unsupported(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification() {
        let not_found = StoreError::NotFound("address = x".to_string());
        assert!(not_found.is_not_found());
        assert!(not_found.is_client_error());
        assert!(!not_found.is_unavailable());

        let db = StoreError::Database(sqlx::Error::PoolTimedOut);
        assert!(db.is_unavailable());
        assert!(!db.is_client_error());

        let cancelled = StoreError::Cancelled;
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_client_error());
        assert!(!cancelled.is_unavailable());
    }
}
