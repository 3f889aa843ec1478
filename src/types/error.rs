//! Error types for the wallet ledger
//!
//! This module defines every error a balance operation can produce, together
//! with the class each error belongs to. The class alone decides whether an
//! operation is retried.
//!
//! # Error Classes
//!
//! - **Validation**: Zero or negative amounts, balances outside the column range
//! - **Business**: Wallet not found, insufficient funds
//! - **Transient**: Lock wait timeout, serialization failure, deadlock
//! - **Infrastructure**: Storage I/O, codec failures, exceeded deadlines

use super::wallet::WalletId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Classification of a [`WalletError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected input, never retried
    Validation,
    /// Deterministic outcome of the current wallet state, never retried
    Business,
    /// Contention expected to clear on its own, retried up to the policy bound
    Transient,
    /// Storage or runtime failure, surfaced immediately
    Infrastructure,
}

/// Main error type for the wallet ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    /// Amount is zero, or negative where a positive amount is required
    #[error("invalid amount '{amount}': amount must be positive")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// The resulting balance does not fit the stored balance column
    #[error("balance {balance} is out of range")]
    BalanceOutOfRange {
        /// The balance that could not be stored, or the balance before the
        /// update when the sum itself overflows
        balance: Decimal,
    },

    /// No wallet exists for the identifier
    ///
    /// Returned by balance reads and by withdrawals. Deposits create the wallet
    /// instead.
    #[error("wallet {wallet_id} not found")]
    WalletNotFound {
        /// The identifier that was looked up
        wallet_id: WalletId,
    },

    /// The withdrawal would take the balance below zero
    ///
    /// The wallet is left unchanged and `balance` carries its balance as of the
    /// rejected operation.
    #[error("insufficient funds in wallet {wallet_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Wallet identifier
        wallet_id: WalletId,
        /// Balance before the rejected operation
        balance: Decimal,
        /// Requested withdrawal amount
        requested: Decimal,
    },

    /// The row lock could not be acquired in time
    #[error("lock wait timeout on wallet {wallet_id}")]
    LockTimeout {
        /// Wallet whose row lock was contended
        wallet_id: WalletId,
    },

    /// The row changed between the locked read and the commit
    #[error("could not serialize access to wallet {wallet_id}")]
    SerializationFailure {
        /// Wallet whose commit conflicted
        wallet_id: WalletId,
    },

    /// The storage engine aborted the unit to break a lock cycle
    #[error("deadlock detected on wallet {wallet_id}")]
    Deadlock {
        /// Wallet the aborted unit was working on
        wallet_id: WalletId,
    },

    /// The caller's deadline passed before the operation completed
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// The storage engine failed
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// Stored bytes could not be encoded or decoded
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure
        message: String,
    },
}

impl WalletError {
    /// Class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            WalletError::InvalidAmount { .. } | WalletError::BalanceOutOfRange { .. } => {
                ErrorClass::Validation
            }
            WalletError::WalletNotFound { .. } | WalletError::InsufficientFunds { .. } => {
                ErrorClass::Business
            }
            WalletError::LockTimeout { .. }
            | WalletError::SerializationFailure { .. }
            | WalletError::Deadlock { .. } => ErrorClass::Transient,
            WalletError::DeadlineExceeded
            | WalletError::Storage { .. }
            | WalletError::Codec { .. } => ErrorClass::Infrastructure,
        }
    }

    /// Whether another attempt may succeed without caller intervention
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Best-effort balance reported alongside the error
    ///
    /// Insufficient funds carries the untouched balance; every other error
    /// reports zero.
    pub fn balance_snapshot(&self) -> Decimal {
        match self {
            WalletError::InsufficientFunds { balance, .. } => *balance,
            _ => Decimal::ZERO,
        }
    }
}

impl From<sled::Error> for WalletError {
    fn from(error: sled::Error) -> Self {
        WalletError::Storage {
            message: error.to_string(),
        }
    }
}

impl From<bincode::Error> for WalletError {
    fn from(error: bincode::Error) -> Self {
        WalletError::Codec {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl WalletError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        WalletError::InvalidAmount { amount }
    }

    /// Create a BalanceOutOfRange error
    pub fn balance_out_of_range(balance: Decimal) -> Self {
        WalletError::BalanceOutOfRange { balance }
    }

    /// Create a WalletNotFound error
    pub fn wallet_not_found(wallet_id: WalletId) -> Self {
        WalletError::WalletNotFound { wallet_id }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(wallet_id: WalletId, balance: Decimal, requested: Decimal) -> Self {
        WalletError::InsufficientFunds {
            wallet_id,
            balance,
            requested,
        }
    }

    /// Create a LockTimeout error
    pub fn lock_timeout(wallet_id: WalletId) -> Self {
        WalletError::LockTimeout { wallet_id }
    }

    /// Create a SerializationFailure error
    pub fn serialization_failure(wallet_id: WalletId) -> Self {
        WalletError::SerializationFailure { wallet_id }
    }

    /// Create a Deadlock error
    pub fn deadlock(wallet_id: WalletId) -> Self {
        WalletError::Deadlock { wallet_id }
    }

    /// Create a Codec error
    pub fn codec(message: impl Into<String>) -> Self {
        WalletError::Codec {
            message: message.into(),
        }
    }
}
