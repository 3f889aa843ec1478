//! Wallet Ledger Library
//! # Overview
//!
//! This library keeps a non-negative balance per wallet and exposes deposits,
//! withdrawals and balance reads that stay correct under heavy concurrent
//! access to the same wallet.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Wallet, OperationType, WalletError, etc.)
//! - [`cli`] - CLI arguments and environment configuration
//! - [`logging`] - Tracing subscriber setup
//! - [`core`] - Business logic components:
//!   - [`core::balance_store`] - Locked, atomic balance updates over sled
//!   - [`core::wallet_service`] - Amount validation and bounded retries
//! - [`api`] - HTTP routes in front of the wallet service
//!
//! # Operations
//!
//! - **Deposit**: Credit funds to a wallet, creating it on first use
//! - **Withdraw**: Debit funds from an existing wallet (requires sufficient balance)
//! - **Get balance**: Read the committed balance of a wallet
//!
//! # Error Classes
//!
//! Every failure falls into one class, which alone decides whether it is retried:
//! - `Validation`: malformed input, never retried
//! - `Business`: wallet not found or insufficient funds, never retried
//! - `Transient`: lock timeout, serialization failure or deadlock, retried
//! - `Infrastructure`: storage failures and deadlines, never retried

// Module declarations
pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod types;

pub use core::{BalanceStore, RetryPolicy, SledBalanceStore, StoreConfig, WalletService};
pub use types::{
    BalanceUpdate, ErrorClass, OperationRecord, OperationType, Wallet, WalletError, WalletId,
};
