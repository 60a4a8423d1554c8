//! Transfer Handler
//!
//! Moves an amount between two wallets and records every attempt that gets
//! past validation.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::domain::{Balance, Transaction, Wallet};
use crate::storage::{StoreError, TransactionStore, WalletStore};

use super::{HandlerError, SendCommand, SendResult};

// =========================================================================
// TransferHandler
// =========================================================================

/// Handler for wallet-to-wallet sends
#[derive(Clone)]
pub struct TransferHandler {
    wallets: Arc<dyn WalletStore>,
    transactions: Arc<dyn TransactionStore>,
}

impl TransferHandler {
    pub fn new(wallets: Arc<dyn WalletStore>, transactions: Arc<dyn TransactionStore>) -> Self {
        Self {
            wallets,
            transactions,
        }
    }

    /// Execute the send command.
    ///
    /// Validation failures (same address, bad amount, unknown wallet) return
    /// without side effects. Every later outcome, success or failure, is
    /// recorded as exactly one transaction.
    pub async fn execute(
        &self,
        command: SendCommand,
        cancel: &CancellationToken,
    ) -> Result<SendResult, HandlerError> {
        if command.from_address == command.to_address {
            return Err(HandlerError::InvalidRequest(
                "Cannot send to the same address".to_string(),
            ));
        }

        let amount: Balance = command
            .amount
            .parse()
            .map_err(|e| HandlerError::InvalidRequest(format!("Invalid amount: {}", e)))?;

        let from = self
            .wallets
            .get_by_address(cancel, &command.from_address)
            .await
            .map_err(|source| HandlerError::LookupFailed {
                target: format!("from-wallet {}", command.from_address),
                source,
            })?;

        let to = self
            .wallets
            .get_by_address(cancel, &command.to_address)
            .await
            .map_err(|source| HandlerError::LookupFailed {
                target: format!("to-wallet {}", command.to_address),
                source,
            })?;

        // Settlement runs on its own task with its own token: dropping this
        // future (timeout, client gone) must not stop it between the debit
        // and the credit or before the attempt is recorded.
        let settlement = self.clone();
        let running = tokio::spawn(async move {
            settlement
                .settle(command.from_address, command.to_address, from, to, amount)
                .await
        });

        running.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Send settlement task failed");
            Err(HandlerError::UpdateFailed {
                step: "settlement",
                source: StoreError::Unavailable(format!("settlement task aborted: {}", e)),
            })
        })
    }

    /// Move the funds and record the attempt, whatever the outcome
    async fn settle(
        &self,
        from_address: String,
        to_address: String,
        from: Wallet,
        to: Wallet,
        amount: Balance,
    ) -> Result<SendResult, HandlerError> {
        let commit = CancellationToken::new();
        let attempted_at = Utc::now();

        let outcome = self.move_funds(&commit, from, to, &amount).await;

        let record = Transaction::attempt(
            from_address,
            to_address,
            amount,
            attempted_at,
            outcome.is_ok(),
        );
        self.finalize(&commit, record, outcome).await
    }

    /// Debit `from`, credit `to`, and compensate if the credit fails
    async fn move_funds(
        &self,
        cancel: &CancellationToken,
        mut from: Wallet,
        mut to: Wallet,
        amount: &Balance,
    ) -> Result<(), HandlerError> {
        if !from.balance.is_sufficient_for(amount) {
            return Err(HandlerError::LackOfCurrency {
                balance: from.balance,
                amount: *amount,
            });
        }

        let original_from = from.balance;
        from.balance = from
            .balance
            .subtract(amount)
            .map_err(|_| HandlerError::LackOfCurrency {
                balance: original_from,
                amount: *amount,
            })?;
        to.balance = to
            .balance
            .add(amount)
            .map_err(|_| HandlerError::BalanceOverflow {
                address: to.address.clone(),
            })?;

        if self.wallets.supports_atomic_pair() {
            return self
                .wallets
                .update_balance_pair(cancel, &from, &to)
                .await
                .map_err(|source| HandlerError::UpdateFailed {
                    step: "from-wallet and to-wallet",
                    source,
                });
        }

        self.wallets
            .update_balance(cancel, &from)
            .await
            .map_err(|source| HandlerError::UpdateFailed {
                step: "from-wallet",
                source,
            })?;

        if let Err(credit_error) = self.wallets.update_balance(cancel, &to).await {
            tracing::warn!(
                from = %from.address,
                to = %to.address,
                error = %credit_error,
                "Credit failed, rolling back debit"
            );

            from.balance = original_from;
            if let Err(source) = self.wallets.update_balance(cancel, &from).await {
                tracing::error!(
                    address = %from.address,
                    amount = %amount,
                    error = %source,
                    "Rollback failed, wallet is debited without matching credit"
                );
                return Err(HandlerError::RollbackFailed {
                    address: from.address,
                    credit_error,
                    source,
                });
            }

            return Err(HandlerError::UpdateFailed {
                step: "to-wallet",
                source: credit_error,
            });
        }

        Ok(())
    }

    /// Record the attempt. A failed insert fails the send even when the money
    /// already moved; balances are left as they are.
    async fn finalize(
        &self,
        cancel: &CancellationToken,
        record: Transaction,
        outcome: Result<(), HandlerError>,
    ) -> Result<SendResult, HandlerError> {
        match self.transactions.insert(cancel, record).await {
            Ok(recorded) => {
                tracing::info!(
                    transaction_id = recorded.id,
                    from = %recorded.from_address,
                    to = %recorded.to_address,
                    amount = %recorded.amount,
                    successful = recorded.successful,
                    "Send recorded"
                );
                outcome.map(|_| SendResult::default())
            }
            Err(source) => {
                let outcome = outcome.err();
                tracing::error!(
                    error = %source,
                    outcome = ?outcome,
                    "Failed to record send attempt"
                );
                Err(HandlerError::InsertFailed {
                    target: "transaction".to_string(),
                    source,
                    outcome: outcome.map(Box::new),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn handler(storage: &MemoryStorage) -> TransferHandler {
        TransferHandler::new(Arc::new(storage.wallets()), Arc::new(storage.transactions()))
    }

    #[tokio::test]
    async fn test_same_address_rejected_without_record() {
        let storage = MemoryStorage::new(2);
        let result = handler(&storage)
            .execute(SendCommand::new("a", "a", "1.00"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(HandlerError::InvalidRequest(_))));
        assert!(storage.all_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected_before_lookup() {
        let storage = MemoryStorage::new(2);
        // Neither wallet exists; the amount check must fail first
        for amount in ["wrong", "-1", ""] {
            let result = handler(&storage)
                .execute(SendCommand::new("a", "b", amount), &CancellationToken::new())
                .await;
            assert!(
                matches!(result, Err(HandlerError::InvalidRequest(_))),
                "Expected InvalidRequest for amount: {:?}",
                amount
            );
        }
        assert!(storage.all_transactions().await.is_empty());
    }
}
