//! Core traits for balance storage
//!
//! The retry orchestrator only talks to storage through [`BalanceStore`], so the
//! sled-backed store and test doubles can be used interchangeably.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{BalanceUpdate, WalletError, WalletId};

/// Trait for the component that owns wallet balances
///
/// Implementations are the only place wallet rows are mutated. Each call to
/// [`apply_delta`](BalanceStore::apply_delta) must behave as one atomic unit:
/// either the whole update is committed or nothing is.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Apply a signed delta to a wallet balance under an exclusive row lock
    ///
    /// A positive delta creates the wallet when it does not exist yet. A negative
    /// delta never creates a wallet.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - the delta is zero
    /// * `WalletNotFound` - negative delta on a wallet that does not exist
    /// * `InsufficientFunds` - the balance would drop below zero
    /// * `LockTimeout`, `SerializationFailure`, `Deadlock` - transient contention
    async fn apply_delta(
        &self,
        wallet_id: WalletId,
        delta: Decimal,
    ) -> Result<BalanceUpdate, WalletError>;

    /// Read the committed balance of a wallet without taking a lock
    async fn get_balance(&self, wallet_id: WalletId) -> Result<Decimal, WalletError>;
}
