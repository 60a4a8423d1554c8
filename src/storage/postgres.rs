//! PostgreSQL Storage
//!
//! Wallet and transaction stores backed by a sqlx pool. Every query runs
//! through the storage gate so request handling can never oversubscribe the
//! pool.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use async_trait::async_trait;

use crate::domain::{Balance, Transaction, Wallet};

use super::{StorageGate, StoreError, TransactionStore, WalletStore};

const UNIQUE_VIOLATION: &str = "23505";

type WalletRow = (i64, Uuid, Decimal);
type TransactionRow = (i64, Uuid, Uuid, Decimal, DateTime<Utc>, bool);

/// Shared pool + gate. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStorage {
    gate: StorageGate<PgPool>,
}

impl PgStorage {
    /// Wrap an existing pool
    pub fn new(pool: PgPool, max_concurrency: usize) -> Self {
        Self {
            gate: StorageGate::new(pool, max_concurrency),
        }
    }

    /// Connect a pool sized to the gate
    pub async fn connect(database_url: &str, max_concurrency: usize) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_concurrency.max(1) as u32)
            .connect(database_url)
            .await?;

        tracing::info!(max_concurrency, "PostgreSQL storage created");
        Ok(Self::new(pool, max_concurrency))
    }

    pub fn pool(&self) -> &PgPool {
        self.gate.handle()
    }

    pub fn wallets(&self) -> PgWalletStore {
        PgWalletStore { storage: self.clone() }
    }

    pub fn transactions(&self) -> PgTransactionStore {
        PgTransactionStore { storage: self.clone() }
    }

    /// Refuse new work and close the pool
    pub async fn close(&self) {
        self.gate.close();
        self.pool().close().await;
        tracing::info!("PostgreSQL storage closed");
    }
}

fn parse_address(address: &str) -> Option<Uuid> {
    Uuid::parse_str(address).ok()
}

fn wallet_from_row((id, address, balance): WalletRow) -> Result<Wallet, StoreError> {
    let balance = Balance::from_decimal(balance)
        .map_err(|e| StoreError::Corrupt(format!("wallet id = {}: {}", id, e)))?;

    Ok(Wallet {
        id,
        address: address.to_string(),
        balance,
    })
}

fn transaction_from_row(
    (id, from_address, to_address, amount, attempted_at, successful): TransactionRow,
) -> Result<Transaction, StoreError> {
    let amount = Balance::from_decimal(amount)
        .map_err(|e| StoreError::Corrupt(format!("transaction id = {}: {}", id, e)))?;

    Ok(Transaction {
        id,
        from_address: from_address.to_string(),
        to_address: to_address.to_string(),
        amount,
        timestamp: attempted_at,
        successful,
    })
}

fn map_insert_error(err: sqlx::Error, address: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::DuplicateAddress(address.to_string());
        }
    }
    StoreError::Database(err)
}

// =========================================================================
// Wallet store
// =========================================================================

#[derive(Debug, Clone)]
pub struct PgWalletStore {
    storage: PgStorage,
}

#[async_trait]
impl WalletStore for PgWalletStore {
    async fn get_by_address(
        &self,
        cancel: &CancellationToken,
        address: &str,
    ) -> Result<Wallet, StoreError> {
        // A malformed address cannot match any row
        let Some(uuid) = parse_address(address) else {
            return Err(StoreError::NotFound(format!("address = {}", address)));
        };

        self.storage
            .gate
            .execute(cancel, move |pool| async move {
                let row: Option<WalletRow> = sqlx::query_as(
                    r#"
                    SELECT id, address, balance
                    FROM wallets
                    WHERE address = $1
                    LIMIT 1
                    "#,
                )
                .bind(uuid)
                .fetch_optional(&pool)
                .await?;

                let row = row.ok_or_else(|| StoreError::NotFound(format!("address = {}", uuid)))?;
                wallet_from_row(row)
            })
            .await
    }

    async fn get_by_id(&self, cancel: &CancellationToken, id: i64) -> Result<Wallet, StoreError> {
        self.storage
            .gate
            .execute(cancel, move |pool| async move {
                let row: Option<WalletRow> = sqlx::query_as(
                    r#"
                    SELECT id, address, balance
                    FROM wallets
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(&pool)
                .await?;

                let row = row.ok_or_else(|| StoreError::NotFound(format!("wallet id = {}", id)))?;
                wallet_from_row(row)
            })
            .await
    }

    async fn insert(
        &self,
        cancel: &CancellationToken,
        wallet: Wallet,
    ) -> Result<Wallet, StoreError> {
        let uuid = parse_address(&wallet.address)
            .ok_or_else(|| StoreError::InvalidAddress(wallet.address.clone()))?;

        self.storage
            .gate
            .execute(cancel, move |pool| async move {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO wallets (address, balance)
                    VALUES ($1, $2)
                    RETURNING id
                    "#,
                )
                .bind(uuid)
                .bind(wallet.balance.value())
                .fetch_one(&pool)
                .await
                .map_err(|e| map_insert_error(e, &wallet.address))?;

                Ok(Wallet { id, ..wallet })
            })
            .await
    }

    async fn update_balance(
        &self,
        cancel: &CancellationToken,
        wallet: &Wallet,
    ) -> Result<(), StoreError> {
        let id = wallet.id;
        let balance = wallet.balance.value();

        self.storage
            .gate
            .execute(cancel, move |pool| async move {
                let rows_affected = sqlx::query("UPDATE wallets SET balance = $2 WHERE id = $1")
                    .bind(id)
                    .bind(balance)
                    .execute(&pool)
                    .await?
                    .rows_affected();

                if rows_affected == 0 {
                    return Err(StoreError::NotFound(format!("wallet id = {}", id)));
                }
                Ok(())
            })
            .await
    }

    fn supports_atomic_pair(&self) -> bool {
        true
    }

    async fn update_balance_pair(
        &self,
        cancel: &CancellationToken,
        debited: &Wallet,
        credited: &Wallet,
    ) -> Result<(), StoreError> {
        let updates = [
            (debited.id, debited.balance.value()),
            (credited.id, credited.balance.value()),
        ];

        self.storage
            .gate
            .execute(cancel, move |pool| async move {
                let mut tx = pool.begin().await?;

                for (id, balance) in updates {
                    let rows_affected = sqlx::query("UPDATE wallets SET balance = $2 WHERE id = $1")
                        .bind(id)
                        .bind(balance)
                        .execute(&mut *tx)
                        .await?
                        .rows_affected();

                    if rows_affected == 0 {
                        // Dropping `tx` rolls back the first update
                        return Err(StoreError::NotFound(format!("wallet id = {}", id)));
                    }
                }

                tx.commit().await?;
                Ok(())
            })
            .await
    }
}

// =========================================================================
// Transaction store
// =========================================================================

#[derive(Debug, Clone)]
pub struct PgTransactionStore {
    storage: PgStorage,
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(
        &self,
        cancel: &CancellationToken,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        let from = parse_address(&transaction.from_address)
            .ok_or_else(|| StoreError::InvalidAddress(transaction.from_address.clone()))?;
        let to = parse_address(&transaction.to_address)
            .ok_or_else(|| StoreError::InvalidAddress(transaction.to_address.clone()))?;

        self.storage
            .gate
            .execute(cancel, move |pool| async move {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO transactions
                        (from_address, to_address, amount, attempted_at, successful)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(from)
                .bind(to)
                .bind(transaction.amount.value())
                .bind(transaction.timestamp)
                .bind(transaction.successful)
                .fetch_one(&pool)
                .await?;

                Ok(Transaction { id, ..transaction })
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
            .execute(cancel, move |pool| async move {
                let row: Option<TransactionRow> = sqlx::query_as(
                    r#"
                    SELECT id, from_address, to_address, amount, attempted_at, successful
                    FROM transactions
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(&pool)
                .await?;

                let row = row
                    .ok_or_else(|| StoreError::NotFound(format!("transaction id = {}", id)))?;
                transaction_from_row(row)
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
            .execute(cancel, move |pool| async move {
                let rows: Vec<TransactionRow> = sqlx::query_as(
                    r#"
                    SELECT id, from_address, to_address, amount, attempted_at, successful
                    FROM transactions
                    WHERE successful = TRUE
                    ORDER BY attempted_at DESC, id DESC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(&pool)
                .await?;

                rows.into_iter().map(transaction_from_row).collect()
            })
            .await
    }
}
