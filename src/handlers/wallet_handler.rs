//! Wallet Handler
//!
//! Balance lookups and startup seeding of wallets.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::{Balance, Wallet};
use crate::storage::WalletStore;

use super::{BalanceResult, GetBalanceQuery, HandlerError};

pub struct WalletHandler {
    wallets: Arc<dyn WalletStore>,
}

impl WalletHandler {
    pub fn new(wallets: Arc<dyn WalletStore>) -> Self {
        Self { wallets }
    }

    pub async fn get_balance(
        &self,
        query: GetBalanceQuery,
        cancel: &CancellationToken,
    ) -> Result<BalanceResult, HandlerError> {
        let wallet = self
            .wallets
            .get_by_address(cancel, &query.address)
            .await
            .map_err(|source| HandlerError::LookupFailed {
                target: format!("wallet {}", query.address),
                source,
            })?;

        Ok(BalanceResult {
            balance: wallet.balance.to_string(),
        })
    }

    /// Insert `count` wallets with random addresses, each holding `balance`.
    ///
    /// Stops at the first failed insert; wallets inserted before it stay.
    pub async fn initialize(
        &self,
        count: usize,
        balance: Balance,
        cancel: &CancellationToken,
    ) -> Result<Vec<Wallet>, HandlerError> {
        let mut seeded = Vec::with_capacity(count);

        for _ in 0..count {
            let wallet = self
                .wallets
                .insert(cancel, Wallet::with_random_address(balance))
                .await
                .map_err(|source| HandlerError::InsertFailed {
                    target: "wallet".to_string(),
                    source,
                    outcome: None,
                })?;

            tracing::info!(
                wallet_id = wallet.id,
                address = %wallet.address,
                balance = %wallet.balance,
                "Wallet seeded"
            );
            seeded.push(wallet);
        }

        Ok(seeded)
    }
}
