//! Ledger Handler
//!
//! Read side of the transaction log.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::storage::TransactionStore;

use super::{GetLastQuery, GetLastResult, HandlerError, TransactionView};

/// Count used when the caller asks for fewer than one transaction
pub const DEFAULT_LAST_COUNT: i64 = 5;

pub struct LedgerHandler {
    transactions: Arc<dyn TransactionStore>,
}

impl LedgerHandler {
    pub fn new(transactions: Arc<dyn TransactionStore>) -> Self {
        Self { transactions }
    }

    /// Most recent successful transactions, newest first
    pub async fn get_last(
        &self,
        query: GetLastQuery,
        cancel: &CancellationToken,
    ) -> Result<GetLastResult, HandlerError> {
        let count = effective_count(query.count);

        let transactions = self
            .transactions
            .get_last_successful(cancel, count)
            .await
            .map_err(HandlerError::QueryFailed)?;

        tracing::debug!(count, returned = transactions.len(), "Fetched last transactions");

        Ok(GetLastResult {
            transactions: transactions.into_iter().map(TransactionView::from).collect(),
        })
    }
}

fn effective_count(count: i64) -> i64 {
    if count < 1 {
        DEFAULT_LAST_COUNT
    } else {
        count
    }
}
