//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `wallet`: Wallet state, identifiers and balance rules
//! - `operation`: Operation types and history records
//! - `error`: Error types and their retry classification

pub mod error;
pub mod operation;
pub mod wallet;

pub use error::{ErrorClass, WalletError};
pub use operation::{OperationRecord, OperationType};
pub use wallet::{BalanceUpdate, Wallet, WalletId, BALANCE_SCALE};
