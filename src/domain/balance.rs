//! Balance type
//!
//! Domain primitive for monetary amounts. A `Balance` can never be negative:
//! every constructor validates, and subtraction refuses to produce a value
//! below zero.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Balance represents a non-negative monetary value in a single unit.
///
/// # Invariants
/// - Value is always zero or positive
/// - Comparison is exact decimal comparison (`1.50 == 1.5`)
///
/// # Example
/// ```
/// use wallet_ledger::domain::Balance;
///
/// let balance: Balance = "100.00".parse().unwrap();
/// let amount: Balance = "3.50".parse().unwrap();
/// let left = balance.subtract(&amount).unwrap();
/// assert_eq!(left.to_string(), "96.5");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Balance(Decimal);

/// Errors that can occur when creating or combining balances
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Balance underflow: {balance} is less than {amount}")]
    Underflow { balance: Decimal, amount: Decimal },

    #[error("Balance overflow")]
    Overflow,
}

impl Balance {
    /// Create a balance from a decimal value.
    ///
    /// # Errors
    /// - `BalanceError::InvalidAmount` if value < 0
    pub fn from_decimal(value: Decimal) -> Result<Self, BalanceError> {
        if value < Decimal::ZERO {
            return Err(BalanceError::InvalidAmount(format!(
                "balance must not be negative (got {})",
                value
            )));
        }

        Ok(Self(value))
    }

    /// Create a balance from a float. The shortest decimal representation of
    /// the float is used, so `100.0` becomes `100`.
    pub fn from_f64(value: f64) -> Result<Self, BalanceError> {
        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| BalanceError::InvalidAmount(format!("not a finite number: {}", value)))?;
        Self::from_decimal(decimal)
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Add another balance. Only fails if the decimal range is exhausted.
    pub fn add(&self, other: &Balance) -> Result<Balance, BalanceError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(BalanceError::Overflow)
    }

    /// Subtract another balance.
    ///
    /// # Errors
    /// - `BalanceError::Underflow` if `other` is greater than `self`
    pub fn subtract(&self, other: &Balance) -> Result<Balance, BalanceError> {
        if self.0 < other.0 {
            return Err(BalanceError::Underflow {
                balance: self.0,
                amount: other.0,
            });
        }

        Ok(Self(self.0 - other.0))
    }

    /// Check if balance is sufficient for withdrawal
    pub fn is_sufficient_for(&self, amount: &Balance) -> bool {
        self.0 >= amount.0
    }
}

impl PartialEq for Balance {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Balance {}

impl PartialOrd for Balance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Balance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

// Canonical text form: trailing zeros stripped, so equal balances print the same.
impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Balance {
    type Err = BalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s)
            .map_err(|e| BalanceError::InvalidAmount(format!("{:?}: {}", s, e)))?;
        Balance::from_decimal(decimal)
    }
}

impl TryFrom<String> for Balance {
    type Error = BalanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Balance::from_str(&value)
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = BalanceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Balance::from_decimal(value)
    }
}

impl From<Balance> for String {
    fn from(balance: Balance) -> Self {
        balance.to_string()
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}
