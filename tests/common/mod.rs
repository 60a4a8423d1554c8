//! Common test utilities

#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use wallet_ledger::api::{self, AppState};
use wallet_ledger::domain::{Balance, Wallet};
use wallet_ledger::handlers::WalletHandler;
use wallet_ledger::storage::{MemoryStorage, PgStorage, Storage, WalletStore};

/// PostgreSQL tests share two tables; run them one at a time
static DB_LOCK: Mutex<()> = Mutex::const_new(());

/// In-memory storage with `count` wallets holding `balance` each
pub async fn seeded_memory(count: usize, balance: &str) -> (Storage, Vec<Wallet>) {
    let storage = Storage::Memory(MemoryStorage::new(4));
    let balance: Balance = balance.parse().expect("valid seed balance");

    let wallets = WalletHandler::new(storage.wallets())
        .initialize(count, balance, &CancellationToken::new())
        .await
        .expect("Failed to seed wallets");

    (storage, wallets)
}

/// Full application router over `storage`
pub fn app(storage: &Storage) -> Router {
    app_with(storage.wallets(), storage, Duration::from_secs(5))
}

/// Router whose wallet calls go through `wallets` and whose requests time
/// out after `request_timeout`
pub fn app_with(
    wallets: Arc<dyn WalletStore>,
    storage: &Storage,
    request_timeout: Duration,
) -> Router {
    api::build_app(AppState::new(wallets, storage.transactions(), request_timeout))
}

/// Connect to DATABASE_URL and empty the tables. Returns None when no
/// database is configured, so callers can skip.
pub async fn setup_test_db() -> Option<(PgStorage, MutexGuard<'static, ()>)> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        }
    };

    let guard = DB_LOCK.lock().await;

    let storage = PgStorage::connect(&database_url, 5)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE wallets, transactions RESTART IDENTITY")
        .execute(storage.pool())
        .await
        .expect("Failed to clean up DB");

    Some((storage, guard))
}
