//! Wallet and Transaction entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Balance;

/// An address-identified account holding a non-negative balance.
///
/// `id` is assigned by the store on insert; wallets built with
/// [`Wallet::unsaved`] carry `0` until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub address: String,
    pub balance: Balance,
}

impl Wallet {
    pub fn unsaved(address: impl Into<String>, balance: Balance) -> Self {
        Self {
            id: 0,
            address: address.into(),
            balance,
        }
    }

    /// New wallet with a random UUID v4 address
    pub fn with_random_address(balance: Balance) -> Self {
        Self::unsaved(Uuid::new_v4().to_string(), balance)
    }
}

/// Immutable record of one attempted transfer, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub from_address: String,
    pub to_address: String,
    pub amount: Balance,
    pub timestamp: DateTime<Utc>,
    pub successful: bool,
}

impl Transaction {
    /// Build a record for an attempt started at `timestamp`. The id is
    /// assigned by the transaction store on insert.
    pub fn attempt(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        amount: Balance,
        timestamp: DateTime<Utc>,
        successful: bool,
    ) -> Self {
        Self {
            id: 0,
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
            timestamp,
            successful,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_random_address_is_uuid() {
        let wallet = Wallet::with_random_address(Balance::zero());
        assert_eq!(wallet.id, 0);
        assert!(Uuid::parse_str(&wallet.address).is_ok());
    }

    #[test]
    fn test_transaction_attempt() {
        let amount: Balance = "3.50".parse().unwrap();
        let now = Utc::now();
        let tx = Transaction::attempt("a", "b", amount, now, false);

        assert_eq!(tx.id, 0);
        assert_eq!(tx.from_address, "a");
        assert_eq!(tx.to_address, "b");
        assert_eq!(tx.timestamp, now);
        assert!(!tx.successful);
    }
}
