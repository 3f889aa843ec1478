//! Core business logic module
//!
//! This module contains the wallet ledger components:
//! - `traits` - The `BalanceStore` seam between orchestration and storage
//! - `row_locks` - Per-wallet exclusive locks with bounded waits
//! - `ledger_db` - Sled trees holding balances and operation history
//! - `balance_store` - Locked read-modify-write of wallet balances
//! - `retry` - Retry bound and backoff for transient errors
//! - `wallet_service` - Validation and retry orchestration of deposits and withdrawals

pub mod balance_store;
pub mod ledger_db;
pub mod retry;
pub mod row_locks;
pub mod traits;
pub mod wallet_service;

pub use balance_store::{SledBalanceStore, StoreConfig};
pub use ledger_db::{CommitRequest, LedgerDb};
pub use retry::RetryPolicy;
pub use row_locks::{RowGuard, RowLocks};
pub use traits::BalanceStore;
pub use wallet_service::WalletService;
