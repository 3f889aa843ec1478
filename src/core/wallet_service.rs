//! Retry orchestration for wallet operations
//!
//! This module provides the `WalletService` struct, which validates deposit and
//! withdrawal requests and drives them through a [`BalanceStore`] under a
//! bounded retry policy.
//!
//! # Retry State Machine
//!
//! ```text
//! Attempt ──► Success                         (terminal)
//!    │
//!    ├──────► Validation / Business error     (terminal, returned as-is)
//!    ├──────► Infrastructure error            (terminal, returned as-is)
//!    └──────► Transient error ──► attempts left?  ── yes ──► backoff ──► Attempt
//!                                               └─ no ───► Exhausted (terminal)
//! ```
//!
//! The decision to retry depends only on [`WalletError::class`], never on the
//! concrete storage error. The service holds no mutable state and can be shared
//! freely across tasks.
//!
//! # Deadlines
//!
//! Callers may pass a deadline. An attempt still running when the deadline passes
//! is dropped, which rolls back its unit and releases the row lock, and the call
//! fails with `WalletError::DeadlineExceeded`. Deadline failures are not retried.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Instant;

use super::retry::RetryPolicy;
use super::traits::BalanceStore;
use crate::types::{BalanceUpdate, ErrorClass, OperationType, WalletError, WalletId};

/// Deposit, withdraw and balance reads with retry on transient contention
pub struct WalletService<S: ?Sized> {
    /// Store owning the wallet rows
    store: Arc<S>,
    /// Retry bound and backoff
    policy: RetryPolicy,
}

impl<S: ?Sized> Clone for WalletService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: BalanceStore + ?Sized> WalletService<S> {
    /// Create a new WalletService
    ///
    /// # Arguments
    ///
    /// * `store` - Arc-wrapped balance store shared with other services
    /// * `policy` - Retry bound and backoff for transient errors
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Deposit funds, creating the wallet on first use
    ///
    /// # Returns
    ///
    /// * `Ok(BalanceUpdate)` - new balance, and whether this deposit created the wallet
    /// * `Err(WalletError::InvalidAmount)` - amount is zero or negative; storage is not touched
    /// * `Err(WalletError::DeadlineExceeded)` - `deadline` passed before the deposit committed
    /// * `Err(_)` - the last transient error once attempts are exhausted, or any
    ///   non-transient store error
    pub async fn deposit(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        deadline: Option<Instant>,
    ) -> Result<BalanceUpdate, WalletError> {
        self.execute(OperationType::Deposit, wallet_id, amount, deadline)
            .await
    }

    /// Withdraw funds from an existing wallet
    ///
    /// # Returns
    ///
    /// * `Ok(Decimal)` - balance after the withdrawal
    /// * `Err(WalletError::InvalidAmount)` - amount is zero or negative; storage is not touched
    /// * `Err(WalletError::WalletNotFound)` - the wallet has never received a deposit
    /// * `Err(WalletError::InsufficientFunds)` - balance is lower than `amount`; nothing changed
    pub async fn withdraw(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        deadline: Option<Instant>,
    ) -> Result<Decimal, WalletError> {
        self.execute(OperationType::Withdraw, wallet_id, amount, deadline)
            .await
            .map(|update| update.balance)
    }

    /// Read the current balance of a wallet
    pub async fn get_balance(&self, wallet_id: WalletId) -> Result<Decimal, WalletError> {
        match self.store.get_balance(wallet_id).await {
            Ok(balance) => Ok(balance),
            Err(error @ WalletError::WalletNotFound { .. }) => {
                tracing::warn!(wallet_id = %wallet_id, "balance requested for unknown wallet");
                Err(error)
            }
            Err(error) => {
                tracing::error!(wallet_id = %wallet_id, error = %error, "balance read failed");
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        operation: OperationType,
        wallet_id: WalletId,
        amount: Decimal,
        deadline: Option<Instant>,
    ) -> Result<BalanceUpdate, WalletError> {
        if amount <= Decimal::ZERO {
            tracing::warn!(
                wallet_id = %wallet_id,
                %operation,
                %amount,
                "rejected non-positive amount"
            );
            return Err(WalletError::invalid_amount(amount));
        }

        let delta = operation.signed(amount);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let error = match self.attempt(wallet_id, delta, deadline).await {
                Ok(update) => return Ok(update),
                Err(error) => error,
            };

            if !error.is_retryable() {
                log_failure(operation, wallet_id, amount, &error);
                return Err(error);
            }

            attempt += 1;
            if attempt >= max_attempts {
                tracing::error!(
                    wallet_id = %wallet_id,
                    %operation,
                    %amount,
                    attempts = attempt,
                    error = %error,
                    "operation failed after retries"
                );
                return Err(error);
            }

            tracing::warn!(
                wallet_id = %wallet_id,
                %operation,
                attempt,
                error = %error,
                "retrying after transient error"
            );
            tokio::time::sleep(self.policy.backoff(attempt - 1)).await;
        }
    }

    /// Run one store call, bounded by the caller's deadline
    async fn attempt(
        &self,
        wallet_id: WalletId,
        delta: Decimal,
        deadline: Option<Instant>,
    ) -> Result<BalanceUpdate, WalletError> {
        let Some(deadline) = deadline else {
            return self.store.apply_delta(wallet_id, delta).await;
        };

        if Instant::now() >= deadline {
            return Err(WalletError::DeadlineExceeded);
        }

        tokio::time::timeout_at(deadline, self.store.apply_delta(wallet_id, delta))
            .await
            .unwrap_or(Err(WalletError::DeadlineExceeded))
    }
}

fn log_failure(operation: OperationType, wallet_id: WalletId, amount: Decimal, error: &WalletError) {
    match error.class() {
        ErrorClass::Business | ErrorClass::Validation => tracing::warn!(
            wallet_id = %wallet_id,
            %operation,
            %amount,
            balance = %error.balance_snapshot(),
            error = %error,
            "operation rejected"
        ),
        ErrorClass::Transient | ErrorClass::Infrastructure => tracing::error!(
            wallet_id = %wallet_id,
            %operation,
            %amount,
            error = %error,
            "operation failed"
        ),
    }
}
