//! Database module
//!
//! Storage connection and schema checks.

use sqlx::PgPool;

use crate::config::{Config, StorageBackend};
use crate::storage::{MemoryStorage, PgStorage, Storage, StoreError};

/// Tables the PostgreSQL backend reads and writes
const REQUIRED_TABLES: &[&str] = &["wallets", "transactions"];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}

/// Open the configured storage backend. PostgreSQL connections are verified
/// and the schema checked before the storage is handed out.
pub async fn connect_storage(config: &Config) -> Result<Storage, StoreError> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::info!(
                max_concurrency = config.storage_max_concurrency,
                "Using in-memory storage"
            );
            Ok(Storage::Memory(MemoryStorage::new(config.storage_max_concurrency)))
        }
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".to_string()))?;

            tracing::info!("Connecting to database...");
            let storage = PgStorage::connect(database_url, config.storage_max_concurrency).await?;

            verify_connection(storage.pool()).await?;
            if !check_schema(storage.pool()).await? {
                storage.close().await;
                return Err(StoreError::Unavailable(
                    "database schema is incomplete, run migrations".to_string(),
                ));
            }

            tracing::info!("Database connected successfully");
            Ok(Storage::Postgres(storage))
        }
    }
}
