//! In-memory Storage
//!
//! Thread-safe wallet and transaction stores kept in process memory. Used by
//! tests and by the `memory` storage backend. Calls go through the same
//! storage gate as the PostgreSQL stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::{Transaction, Wallet};

use super::{StorageGate, StoreError, TransactionStore, WalletStore};

#[derive(Debug, Default)]
struct MemoryState {
    wallets: HashMap<i64, Wallet>,
    wallet_ids_by_address: HashMap<String, i64>,
    transactions: Vec<Transaction>,
    last_wallet_id: i64,
    last_transaction_id: i64,
}

type SharedState = Arc<RwLock<MemoryState>>;

/// Shared state + gate. Cheap to clone; clones see the same data.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    gate: StorageGate<SharedState>,
}

impl MemoryStorage {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            gate: StorageGate::new(SharedState::default(), max_concurrency),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.gate.max_concurrency()
    }

    /// Gate slots not held by a running operation
    pub fn available_slots(&self) -> usize {
        self.gate.available()
    }

    pub fn wallets(&self) -> MemoryWalletStore {
        MemoryWalletStore { storage: self.clone() }
    }

    pub fn transactions(&self) -> MemoryTransactionStore {
        MemoryTransactionStore { storage: self.clone() }
    }

    /// Every recorded transaction, successful or not, in insertion order
    pub async fn all_transactions(&self) -> Vec<Transaction> {
        self.gate.handle().read().await.transactions.clone()
    }

    pub fn close(&self) {
        self.gate.close();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(super::default_max_concurrency())
    }
}

// =========================================================================
// Wallet store
// =========================================================================

#[derive(Debug, Clone)]
pub struct MemoryWalletStore {
    storage: MemoryStorage,
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn get_by_address(
        &self,
        cancel: &CancellationToken,
        address: &str,
    ) -> Result<Wallet, StoreError> {
        let address = address.to_string();

        self.storage
            .gate
            .execute(cancel, move |state| async move {
                let state = state.read().await;
                state
                    .wallet_ids_by_address
                    .get(&address)
                    .and_then(|id| state.wallets.get(id))
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("address = {}", address)))
            })
            .await
    }

    async fn get_by_id(&self, cancel: &CancellationToken, id: i64) -> Result<Wallet, StoreError> {
        self.storage
            .gate
            .execute(cancel, move |state| async move {
                let state = state.read().await;
                state
                    .wallets
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("wallet id = {}", id)))
            })
            .await
    }

    async fn insert(
        &self,
        cancel: &CancellationToken,
        wallet: Wallet,
    ) -> Result<Wallet, StoreError> {
        self.storage
            .gate
            .execute(cancel, move |state| async move {
                let mut state = state.write().await;
                if state.wallet_ids_by_address.contains_key(&wallet.address) {
                    return Err(StoreError::DuplicateAddress(wallet.address));
                }

                state.last_wallet_id += 1;
                let wallet = Wallet {
                    id: state.last_wallet_id,
                    ..wallet
                };
                state
                    .wallet_ids_by_address
                    .insert(wallet.address.clone(), wallet.id);
                state.wallets.insert(wallet.id, wallet.clone());

                Ok(wallet)
            })
            .await
    }

    async fn update_balance(
        &self,
        cancel: &CancellationToken,
        wallet: &Wallet,
    ) -> Result<(), StoreError> {
        let id = wallet.id;
        let balance = wallet.balance;

        self.storage
            .gate
            .execute(cancel, move |state| async move {
                let mut state = state.write().await;
                let stored = state
                    .wallets
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::NotFound(format!("wallet id = {}", id)))?;
                stored.balance = balance;
                Ok(())
            })
            .await
    }
}

// =========================================================================
// Transaction store
// =========================================================================

#[derive(Debug, Clone)]
pub struct MemoryTransactionStore {
    storage: MemoryStorage,
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn insert(
        &self,
        cancel: &CancellationToken,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        self.storage
            .gate
            .execute(cancel, move |state| async move {
                let mut state = state.write().await;
                state.last_transaction_id += 1;
                let transaction = Transaction {
                    id: state.last_transaction_id,
                    ..transaction
                };
                state.transactions.push(transaction.clone());

                Ok(transaction)
            })
            .await
    }

    async fn get_by_id(
        &self,
        cancel: &CancellationToken,
        id: i64,
    ) -> Result<Transaction, StoreError> {
        self.storage
            .gate
            .execute(cancel, move |state| async move {
                let state = state.read().await;
                state
                    .transactions
                    .iter()
                    .find(|t| t.id == id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("transaction id = {}", id)))
            })
            .await
    }

    async fn get_last_successful(
        &self,
        cancel: &CancellationToken,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        if limit < 1 {
            return Err(StoreError::InvalidLimit(limit));
        }

        self.storage
            .gate
            .execute(cancel, move |state| async move {
                let state = state.read().await;
                let mut successful: Vec<Transaction> = state
                    .transactions
                    .iter()
                    .filter(|t| t.successful)
                    .cloned()
                    .collect();

                successful.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
                successful.truncate(limit as usize);

                Ok(successful)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Balance;
    use chrono::{Duration, Utc};

    fn balance(s: &str) -> Balance {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_wallet_insert_assigns_ids() {
        let storage = MemoryStorage::new(2);
        let wallets = storage.wallets();
        let cancel = CancellationToken::new();

        let first = wallets
            .insert(&cancel, Wallet::with_random_address(balance("100")))
            .await
            .unwrap();
        let second = wallets
            .insert(&cancel, Wallet::with_random_address(balance("50")))
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let loaded = wallets.get_by_address(&cancel, &second.address).await.unwrap();
        assert_eq!(loaded, second);
        let loaded = wallets.get_by_id(&cancel, first.id).await.unwrap();
        assert_eq!(loaded, first);
    }

    #[tokio::test]
    async fn test_wallet_duplicate_address() {
        let storage = MemoryStorage::new(2);
        let wallets = storage.wallets();
        let cancel = CancellationToken::new();

        let wallet = Wallet::unsaved("addr-1", balance("1"));
        wallets.insert(&cancel, wallet.clone()).await.unwrap();

        let result = wallets.insert(&cancel, wallet).await;
        assert!(matches!(result, Err(StoreError::DuplicateAddress(_))));
    }

    #[tokio::test]
    async fn test_wallet_not_found() {
        let storage = MemoryStorage::new(2);
        let wallets = storage.wallets();
        let cancel = CancellationToken::new();

        assert!(wallets.get_by_address(&cancel, "missing").await.unwrap_err().is_not_found());
        assert!(wallets.get_by_id(&cancel, 999).await.unwrap_err().is_not_found());

        let ghost = Wallet {
            id: 999,
            address: "ghost".to_string(),
            balance: Balance::zero(),
        };
        assert!(wallets.update_balance(&cancel, &ghost).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_balance() {
        let storage = MemoryStorage::new(2);
        let wallets = storage.wallets();
        let cancel = CancellationToken::new();

        let mut wallet = wallets
            .insert(&cancel, Wallet::with_random_address(balance("100")))
            .await
            .unwrap();
        wallet.balance = balance("96.50");
        wallets.update_balance(&cancel, &wallet).await.unwrap();

        let loaded = wallets.get_by_address(&cancel, &wallet.address).await.unwrap();
        assert_eq!(loaded.balance, balance("96.5"));
    }

    #[tokio::test]
    async fn test_atomic_pair_not_supported() {
        let storage = MemoryStorage::new(1);
        let wallets = storage.wallets();
        let wallet = Wallet::unsaved("a", Balance::zero());

        assert!(!wallets.supports_atomic_pair());
        let result = wallets
            .update_balance_pair(&CancellationToken::new(), &wallet, &wallet)
            .await;
        assert!(matches!(result, Err(StoreError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_last_successful_ordering() {
        let storage = MemoryStorage::new(2);
        let transactions = storage.transactions();
        let cancel = CancellationToken::new();
        let start = Utc::now();

        for (offset, successful) in [(0, true), (2, true), (1, true), (3, false)] {
            transactions
                .insert(
                    &cancel,
                    Transaction::attempt(
                        "a",
                        "b",
                        balance("1"),
                        start + Duration::seconds(offset),
                        successful,
                    ),
                )
                .await
                .unwrap();
        }

        let last = transactions.get_last_successful(&cancel, 10).await.unwrap();
        let offsets: Vec<i64> = last
            .iter()
            .map(|t| (t.timestamp - start).num_seconds())
            .collect();
        assert_eq!(offsets, vec![2, 1, 0]);

        let last = transactions.get_last_successful(&cancel, 2).await.unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].id, 2);

        assert_eq!(storage.all_transactions().await.len(), 4);
    }

    #[tokio::test]
    async fn test_last_successful_ties_broken_by_id() {
        let storage = MemoryStorage::new(2);
        let transactions = storage.transactions();
        let cancel = CancellationToken::new();
        let now = Utc::now();

        for _ in 0..3 {
            transactions
                .insert(&cancel, Transaction::attempt("a", "b", balance("1"), now, true))
                .await
                .unwrap();
        }

        let ids: Vec<i64> = transactions
            .get_last_successful(&cancel, 3)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_last_successful_invalid_limit() {
        let storage = MemoryStorage::new(2);
        let result = storage
            .transactions()
            .get_last_successful(&CancellationToken::new(), 0)
            .await;
        assert!(matches!(result, Err(StoreError::InvalidLimit(0))));
    }

    #[tokio::test]
    async fn test_transaction_get_by_id() {
        let storage = MemoryStorage::new(2);
        let transactions = storage.transactions();
        let cancel = CancellationToken::new();

        let inserted = transactions
            .insert(&cancel, Transaction::attempt("a", "b", balance("2.5"), Utc::now(), false))
            .await
            .unwrap();

        let loaded = transactions.get_by_id(&cancel, inserted.id).await.unwrap();
        assert_eq!(loaded, inserted);
        assert!(transactions.get_by_id(&cancel, 42).await.unwrap_err().is_not_found());
    }
}
