//! Storage module
//!
//! Capability traits for wallet and transaction persistence, the gate that
//! bounds concurrent store access, and the PostgreSQL and in-memory backends.

mod error;
mod gate;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{Transaction, Wallet};

pub use error::StoreError;
pub use gate::{default_max_concurrency, StorageGate};
pub use memory::MemoryStorage;
pub use postgres::PgStorage;

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_by_address(
        &self,
        cancel: &CancellationToken,
        address: &str,
    ) -> Result<Wallet, StoreError>;

    async fn get_by_id(&self, cancel: &CancellationToken, id: i64) -> Result<Wallet, StoreError>;

    /// Insert a wallet, returning it with its assigned id
    async fn insert(
        &self,
        cancel: &CancellationToken,
        wallet: Wallet,
    ) -> Result<Wallet, StoreError>;

    /// Overwrite the balance of the wallet with `wallet.id`
    async fn update_balance(
        &self,
        cancel: &CancellationToken,
        wallet: &Wallet,
    ) -> Result<(), StoreError>;

    /// Whether `update_balance_pair` commits both rows atomically
    fn supports_atomic_pair(&self) -> bool {
        false
    }

    /// Overwrite both balances in a single commit
    async fn update_balance_pair(
        &self,
        _cancel: &CancellationToken,
        _debited: &Wallet,
        _credited: &Wallet,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("update_balance_pair"))
    }
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a transaction record, returning it with its assigned id
    async fn insert(
        &self,
        cancel: &CancellationToken,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError>;

    async fn get_by_id(
        &self,
        cancel: &CancellationToken,
        id: i64,
    ) -> Result<Transaction, StoreError>;

    /// Most recent successful transactions first, at most `limit` of them
    async fn get_last_successful(
        &self,
        cancel: &CancellationToken,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError>;
}

/// The configured backend, handed out as trait objects
#[derive(Debug, Clone)]
pub enum Storage {
    Postgres(PgStorage),
    Memory(MemoryStorage),
}

impl Storage {
    pub fn wallets(&self) -> Arc<dyn WalletStore> {
        match self {
            Storage::Postgres(storage) => Arc::new(storage.wallets()),
            Storage::Memory(storage) => Arc::new(storage.wallets()),
        }
    }

    pub fn transactions(&self) -> Arc<dyn TransactionStore> {
        match self {
            Storage::Postgres(storage) => Arc::new(storage.transactions()),
            Storage::Memory(storage) => Arc::new(storage.transactions()),
        }
    }

    pub async fn close(&self) {
        match self {
            Storage::Postgres(storage) => storage.close().await,
            Storage::Memory(storage) => storage.close(),
        }
    }
}
