//! Command definitions
//!
//! Commands and queries accepted by the handlers, and the results they return.
//! Amounts travel as decimal text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Transaction;

// =========================================================================
// SendCommand
// =========================================================================

/// Command to move an amount from one wallet to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCommand {
    pub from_address: String,
    pub to_address: String,
    /// Amount to transfer (as string for precise decimal)
    pub amount: String,
}

impl SendCommand {
    pub fn new(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount: amount.into(),
        }
    }
}

/// Acknowledgement of a successful send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {}

// =========================================================================
// GetLastQuery
// =========================================================================

/// Query for the most recent successful transactions
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetLastQuery {
    /// Values below 1 fall back to the default count
    pub count: i64,
}

impl GetLastQuery {
    pub fn new(count: i64) -> Self {
        Self { count }
    }
}

/// One transaction as exposed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: i64,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            from: transaction.from_address,
            to: transaction.to_address,
            amount: transaction.amount.to_string(),
            timestamp: transaction.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLastResult {
    pub transactions: Vec<TransactionView>,
}

// =========================================================================
// GetBalanceQuery
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBalanceQuery {
    pub address: String,
}

impl GetBalanceQuery {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResult {
    pub balance: String,
}
