//! Operation-related types for the wallet ledger
//!
//! Deposits and withdrawals are the only two operations. Both are turned into a
//! signed delta before they reach the balance store.

use super::wallet::WalletId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation types supported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Credit funds to a wallet, creating it on first use
    Deposit,

    /// Debit funds from an existing wallet
    Withdraw,
}

impl OperationType {
    /// Infer the operation type from the sign of a delta
    ///
    /// Positive deltas are deposits, negative deltas are withdrawals.
    pub fn from_delta(delta: Decimal) -> Self {
        if delta < Decimal::ZERO {
            OperationType::Withdraw
        } else {
            OperationType::Deposit
        }
    }

    /// Turn a positive amount into the signed delta applied to the balance
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            OperationType::Deposit => amount,
            OperationType::Withdraw => -amount,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Deposit => f.write_str("DEPOSIT"),
            OperationType::Withdraw => f.write_str("WITHDRAW"),
        }
    }
}

/// History entry written alongside a balance update
///
/// Only written when history recording is enabled on the store. The entry is
/// committed in the same storage transaction as the balance it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Wallet the operation was applied to
    pub wallet_id: WalletId,

    /// Deposit or withdrawal
    pub operation_type: OperationType,

    /// Unsigned amount of the operation
    ///
    /// Encoded as a string so that non-self-describing formats such as bincode
    /// can decode it.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,
}

impl OperationRecord {
    /// Build a history entry from the signed delta applied to a wallet
    pub fn from_delta(wallet_id: WalletId, delta: Decimal) -> Self {
        OperationRecord {
            wallet_id,
            operation_type: OperationType::from_delta(delta),
            amount: delta.abs(),
            created_at: Utc::now(),
        }
    }
}
