//! API Routes
//!
//! HTTP endpoint definitions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::{
    GetBalanceQuery, GetLastQuery, LedgerHandler, SendCommand, SendResult, TransactionView,
    TransferHandler, WalletHandler,
};
use crate::storage::{TransactionStore, WalletStore};

// =========================================================================
// State
// =========================================================================

/// Shared by every request
#[derive(Clone)]
pub struct AppState {
    pub wallets: Arc<dyn WalletStore>,
    pub transactions: Arc<dyn TransactionStore>,
    /// Requests running longer than this are cancelled
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        transactions: Arc<dyn TransactionStore>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            wallets,
            transactions,
            request_timeout,
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

/// Amounts are accepted as JSON strings or numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    pub fn into_text(self) -> String {
        match self {
            AmountInput::Text(text) => text,
            AmountInput::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    pub amount: AmountInput,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub count: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub timestamp: DateTime<Utc>,
}

impl From<TransactionView> for TransactionResponse {
    fn from(view: TransactionView) -> Self {
        Self {
            id: view.id,
            from: view.from,
            to: view.to,
            amount: view.amount,
            timestamp: view.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send))
        .route("/transactions", get(get_transactions))
        .route("/wallet/:address/balance", get(get_wallet_balance))
}

// =========================================================================
// POST /send
// =========================================================================

/// Move an amount between two wallets
async fn send(
    State(state): State<AppState>,
    Extension(cancel): Extension<CancellationToken>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResult>, AppError> {
    let handler = TransferHandler::new(state.wallets, state.transactions);

    let command = SendCommand::new(request.from, request.to, request.amount.into_text());
    let result = handler.execute(command, &cancel).await?;

    Ok(Json(result))
}

// =========================================================================
// GET /transactions?count=N
// =========================================================================

/// Most recent successful transactions
async fn get_transactions(
    State(state): State<AppState>,
    Extension(cancel): Extension<CancellationToken>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let count = query.count.unwrap_or(0);
    if count < 0 {
        return Err(AppError::InvalidRequest(format!(
            "count must not be negative, got {}",
            count
        )));
    }

    let handler = LedgerHandler::new(state.transactions);
    let result = handler.get_last(GetLastQuery::new(count), &cancel).await?;

    Ok(Json(TransactionsResponse {
        transactions: result
            .transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    }))
}

// =========================================================================
// GET /wallet/:address/balance
// =========================================================================

async fn get_wallet_balance(
    State(state): State<AppState>,
    Extension(cancel): Extension<CancellationToken>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    if Uuid::parse_str(&address).is_err() {
        return Err(AppError::InvalidRequest(format!(
            "address must be a UUID, got {}",
            address
        )));
    }

    let handler = WalletHandler::new(state.wallets);
    let result = handler
        .get_balance(GetBalanceQuery::new(address), &cancel)
        .await?;

    Ok(Json(BalanceResponse {
        balance: result.balance,
    }))
}
