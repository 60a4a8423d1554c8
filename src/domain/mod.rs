//! Domain module
//!
//! Core domain types: the balance value type and the wallet/transaction
//! entities.

pub mod balance;
pub mod wallet;

pub use balance::{Balance, BalanceError};
pub use wallet::{Transaction, Wallet};
