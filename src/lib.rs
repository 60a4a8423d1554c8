//! Wallet Ledger Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod handlers;
pub mod storage;

mod error;

pub use config::Config;
pub use domain::{Balance, BalanceError, Transaction, Wallet};
pub use error::AppError;
