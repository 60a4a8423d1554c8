//! Handlers module
//!
//! Operations on wallets and the transaction log. Each handler talks to the
//! stores only through the storage traits.

mod commands;
mod error;
mod ledger_handler;
mod transfer_handler;
mod wallet_handler;


pub use commands::*;
pub use error::{ErrorKind, HandlerError};
pub use ledger_handler::{LedgerHandler, DEFAULT_LAST_COUNT};
pub use transfer_handler::TransferHandler;
pub use wallet_handler::WalletHandler;
