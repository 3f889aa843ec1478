//! Wallet-related types for the wallet ledger
//!
//! This module defines the Wallet structure, the outcome of a balance update,
//! and the rules that turn a computed balance into a stored one.

use super::error::WalletError;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Wallet identifier
///
/// Opaque 128-bit identifier supplied by the caller. The ledger never generates
/// identifiers on its own.
pub type WalletId = Uuid;

/// Number of fractional digits kept for every stored balance
pub const BALANCE_SCALE: u32 = 2;

/// Exclusive upper bound for the magnitude of a stored balance
///
/// Matches a `DECIMAL(15, 2)` column: 13 integer digits and 2 fractional digits.
const BALANCE_LIMIT: i64 = 10_000_000_000_000;

/// Wallet state as persisted by the balance store
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    /// The caller-supplied wallet identifier
    pub id: WalletId,

    /// Current balance, never negative, always at [`BALANCE_SCALE`] digits
    pub balance: Decimal,
}

impl Wallet {
    /// Create a wallet snapshot
    pub fn new(id: WalletId, balance: Decimal) -> Self {
        Wallet { id, balance }
    }

    /// Convert a computed balance into its stored form
    ///
    /// The balance is rounded to [`BALANCE_SCALE`] fractional digits (midpoint away
    /// from zero) and padded to exactly that scale, so `100.5` is stored as `100.50`.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::BalanceOutOfRange` when the rounded balance no longer
    /// fits into 13 integer digits.
    pub fn normalize_balance(balance: Decimal) -> Result<Decimal, WalletError> {
        let mut stored =
            balance.round_dp_with_strategy(BALANCE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        stored.rescale(BALANCE_SCALE);

        if stored.abs() >= Decimal::from(BALANCE_LIMIT) {
            return Err(WalletError::balance_out_of_range(balance));
        }

        Ok(stored)
    }
}

/// Result of a successful balance update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    /// Balance after the delta was committed
    pub balance: Decimal,

    /// Whether this update created the wallet
    ///
    /// True for exactly one update per wallet identifier: the first deposit whose
    /// insert actually took effect.
    pub created: bool,
}
