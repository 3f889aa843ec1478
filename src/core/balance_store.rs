//! Transactional balance store
//!
//! This module provides `SledBalanceStore`, the component that owns wallet rows
//! and performs every balance mutation.
//!
//! # Design
//!
//! An update is one locked unit:
//!
//! ```text
//! apply_delta(wallet, delta)
//!     ├── RowLocks::acquire     (exclusive row lock, bounded wait)
//!     ├── LedgerDb::read_wallet (current balance or absent row)
//!     ├── balance rules         (not found / insufficient funds / range)
//!     └── LedgerDb::commit      (compare-and-set write + optional history)
//! ```
//!
//! Nothing is written before the commit, so returning early on any error leaves
//! no partial effect behind. The row guard is dropped on every exit path, which
//! releases the lock.
//!
//! # Lazy Creation
//!
//! A deposit on a missing row stages an insert. The commit only succeeds if the
//! row is still absent; when another writer created it first the store re-reads
//! the row under the same lock and applies the delta as an update. Creation is
//! therefore never assumed, and `created` is reported only by the unit whose
//! insert committed. A conflict on an existing row is still returned as
//! `SerializationFailure` for the caller to retry.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::Path;
use std::time::Duration;

use super::ledger_db::{CommitRequest, LedgerDb};
use super::row_locks::RowLocks;
use super::traits::BalanceStore;
use crate::types::{BalanceUpdate, OperationRecord, Wallet, WalletError, WalletId};

/// Configuration of the balance store
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum time to wait for a wallet's row lock
    pub lock_timeout: Duration,
    /// Whether each update also writes an operation history record
    pub record_history: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            record_history: false,
        }
    }
}

/// Balance store backed by sled with per-wallet row locks
#[derive(Debug)]
pub struct SledBalanceStore {
    db: LedgerDb,
    locks: RowLocks,
    config: StoreConfig,
}

impl SledBalanceStore {
    /// Create a store over an opened database
    pub fn new(db: LedgerDb, config: StoreConfig) -> Self {
        Self {
            db,
            locks: RowLocks::new(),
            config,
        }
    }

    /// Open the store at a filesystem path
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self, WalletError> {
        Ok(Self::new(LedgerDb::open(path)?, config))
    }

    /// Open a store that lives in memory, mostly for tests
    pub fn open_temporary(config: StoreConfig) -> Result<Self, WalletError> {
        Ok(Self::new(LedgerDb::open_temporary()?, config))
    }

    /// The underlying database
    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), WalletError> {
        self.db.flush()
    }

    /// Read-modify-write one wallet while its row lock is held
    fn update_locked(
        &self,
        wallet_id: WalletId,
        delta: Decimal,
    ) -> Result<BalanceUpdate, WalletError> {
        let observed = self.db.read_wallet(wallet_id)?.map(|wallet| wallet.balance);
        self.update_from(wallet_id, delta, observed)
    }

    /// Apply a delta on top of the balance observed under the row lock
    ///
    /// If an insert loses to a row created in the meantime, the row is read once
    /// more and the delta applied to it as an update.
    fn update_from(
        &self,
        wallet_id: WalletId,
        delta: Decimal,
        observed: Option<Decimal>,
    ) -> Result<BalanceUpdate, WalletError> {
        match self.write(wallet_id, delta, observed) {
            Err(WalletError::SerializationFailure { .. }) if observed.is_none() => {
                tracing::debug!(wallet_id = %wallet_id, "wallet created concurrently, re-reading");
                let current = self.db.read_wallet(wallet_id)?.map(|wallet| wallet.balance);
                self.write(wallet_id, delta, current)
            }
            result => result,
        }
    }

    fn write(
        &self,
        wallet_id: WalletId,
        delta: Decimal,
        current: Option<Decimal>,
    ) -> Result<BalanceUpdate, WalletError> {
        let (current_balance, created) = match current {
            Some(balance) => (balance, false),
            None if delta < Decimal::ZERO => {
                return Err(WalletError::wallet_not_found(wallet_id));
            }
            None => (Decimal::ZERO, true),
        };

        // On overflow there is no resulting balance; report the one before the update.
        let new_balance = current_balance
            .checked_add(delta)
            .ok_or_else(|| WalletError::balance_out_of_range(current_balance))?;

        if new_balance < Decimal::ZERO {
            return Err(WalletError::insufficient_funds(
                wallet_id,
                current_balance,
                delta.abs(),
            ));
        }

        let stored = Wallet::normalize_balance(new_balance)?;
        let record = self
            .config
            .record_history
            .then(|| OperationRecord::from_delta(wallet_id, delta));

        self.db.commit(&CommitRequest {
            wallet_id,
            expected: current,
            balance: stored,
            record,
        })?;

        Ok(BalanceUpdate {
            balance: stored,
            created,
        })
    }
}

#[async_trait]
impl BalanceStore for SledBalanceStore {
    async fn apply_delta(
        &self,
        wallet_id: WalletId,
        delta: Decimal,
    ) -> Result<BalanceUpdate, WalletError> {
        if delta.is_zero() {
            return Err(WalletError::invalid_amount(delta));
        }

        let _row = self
            .locks
            .acquire(wallet_id, self.config.lock_timeout)
            .await?;

        let result = self.update_locked(wallet_id, delta);
        if let Err(error @ (WalletError::Storage { .. } | WalletError::Codec { .. })) = &result {
            tracing::error!(wallet_id = %wallet_id, %delta, error = %error, "balance update failed");
        }
        result
    }

    async fn get_balance(&self, wallet_id: WalletId) -> Result<Decimal, WalletError> {
        match self.db.read_wallet(wallet_id) {
            Ok(Some(wallet)) => Ok(wallet.balance),
            Ok(None) => Err(WalletError::wallet_not_found(wallet_id)),
            Err(error) => {
                tracing::error!(wallet_id = %wallet_id, error = %error, "failed to read balance");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperationType;
    use rstest::rstest;
    use std::str::FromStr;
    use std::sync::Arc;
    use uuid::Uuid;

    fn store() -> SledBalanceStore {
        SledBalanceStore::open_temporary(StoreConfig::default()).unwrap()
    }

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[tokio::test]
    async fn test_first_deposit_creates_wallet() {
        let store = store();
        let wallet_id = Uuid::new_v4();

        let update = store.apply_delta(wallet_id, dec("100.99")).await.unwrap();

        assert!(update.created);
        assert_eq!(update.balance, dec("100.99"));
        assert_eq!(store.get_balance(wallet_id).await.unwrap(), dec("100.99"));
    }

    #[tokio::test]
    async fn test_second_deposit_updates_wallet() {
        let store = store();
        let wallet_id = Uuid::new_v4();

        store.apply_delta(wallet_id, dec("10")).await.unwrap();
        let update = store.apply_delta(wallet_id, dec("5.5")).await.unwrap();

        assert!(!update.created);
        assert_eq!(update.balance.to_string(), "15.50");
    }

    #[rstest]
    #[case::zero_delta("0")]
    #[case::zero_with_scale("0.00")]
    #[tokio::test]
    async fn test_zero_delta_is_invalid(#[case] delta: &str) {
        let store = store();
        let wallet_id = Uuid::new_v4();

        let result = store.apply_delta(wallet_id, dec(delta)).await;

        assert!(matches!(result, Err(WalletError::InvalidAmount { .. })));
        assert_eq!(store.db().wallet_count(), 0);
    }

    #[tokio::test]
    async fn test_withdraw_from_missing_wallet_creates_nothing() {
        let store = store();
        let wallet_id = Uuid::new_v4();

        let result = store.apply_delta(wallet_id, dec("-10")).await;

        assert_eq!(result.unwrap_err(), WalletError::wallet_not_found(wallet_id));
        assert_eq!(store.db().wallet_count(), 0);
    }

    #[tokio::test]
    async fn test_overdraw_leaves_balance_unchanged() {
        let store = store();
        let wallet_id = Uuid::new_v4();
        store.apply_delta(wallet_id, dec("100.99")).await.unwrap();

        let result = store.apply_delta(wallet_id, dec("-200")).await;

        assert_eq!(
            result.unwrap_err(),
            WalletError::insufficient_funds(wallet_id, dec("100.99"), dec("200"))
        );
        assert_eq!(store.get_balance(wallet_id).await.unwrap(), dec("100.99"));
    }

    #[tokio::test]
    async fn test_withdraw_to_exactly_zero() {
        let store = store();
        let wallet_id = Uuid::new_v4();
        store.apply_delta(wallet_id, dec("1000000000000")).await.unwrap();

        let update = store
            .apply_delta(wallet_id, dec("-1000000000000"))
            .await
            .unwrap();

        assert_eq!(update.balance, Decimal::ZERO);
        assert_eq!(update.balance.to_string(), "0.00");
    }

    #[tokio::test]
    async fn test_balance_beyond_column_range_is_rejected() {
        let store = store();
        let wallet_id = Uuid::new_v4();
        store.apply_delta(wallet_id, dec("9999999999999")).await.unwrap();

        let result = store.apply_delta(wallet_id, dec("1")).await;

        assert!(matches!(result, Err(WalletError::BalanceOutOfRange { .. })));
        assert_eq!(
            store.get_balance(wallet_id).await.unwrap(),
            dec("9999999999999")
        );
    }

    #[tokio::test]
    async fn test_get_balance_of_missing_wallet() {
        let store = store();
        let wallet_id = Uuid::new_v4();

        let error = store.get_balance(wallet_id).await.unwrap_err();

        assert_eq!(error, WalletError::wallet_not_found(wallet_id));
        assert_eq!(error.balance_snapshot(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_held_row_lock_times_out() {
        let store = SledBalanceStore::open_temporary(StoreConfig {
            lock_timeout: Duration::from_millis(20),
            record_history: false,
        })
        .unwrap();
        let wallet_id = Uuid::new_v4();

        let _held = store
            .locks
            .acquire(wallet_id, Duration::from_secs(1))
            .await
            .unwrap();
        let result = store.apply_delta(wallet_id, dec("1")).await;

        assert_eq!(result.unwrap_err(), WalletError::lock_timeout(wallet_id));
        assert_eq!(store.db().wallet_count(), 0);
    }

    #[tokio::test]
    async fn test_get_balance_ignores_held_row_lock() {
        let store = store();
        let wallet_id = Uuid::new_v4();
        store.apply_delta(wallet_id, dec("10")).await.unwrap();

        let _held = store
            .locks
            .acquire(wallet_id, Duration::from_secs(1))
            .await
            .unwrap();
        let read = tokio::time::timeout(Duration::from_millis(100), store.get_balance(wallet_id))
            .await
            .expect("balance read waited for the row lock");

        assert_eq!(read.unwrap().to_string(), "10.00");
    }

    #[test]
    fn test_insert_conflict_rereads_and_updates() {
        let store = store();
        let wallet_id = Uuid::new_v4();
        store
            .db()
            .commit(&CommitRequest {
                wallet_id,
                expected: None,
                balance: dec("5.00"),
                record: None,
            })
            .unwrap();

        // The row was observed absent, then created by another writer.
        let update = store.update_from(wallet_id, dec("1.25"), None).unwrap();

        assert!(!update.created);
        assert_eq!(update.balance.to_string(), "6.25");
    }

    #[test]
    fn test_stale_update_is_not_reread() {
        let store = store();
        let wallet_id = Uuid::new_v4();
        store
            .db()
            .commit(&CommitRequest {
                wallet_id,
                expected: None,
                balance: dec("5.00"),
                record: None,
            })
            .unwrap();

        let result = store.update_from(wallet_id, dec("1"), Some(dec("3.00")));

        assert_eq!(
            result.unwrap_err(),
            WalletError::serialization_failure(wallet_id)
        );
    }

    #[tokio::test]
    async fn test_overflowing_delta_reports_balance_before_update() {
        let store = store();
        let wallet_id = Uuid::new_v4();
        store.apply_delta(wallet_id, dec("1")).await.unwrap();

        let result = store.apply_delta(wallet_id, Decimal::MAX).await;

        assert_eq!(
            result.unwrap_err(),
            WalletError::balance_out_of_range(dec("1.00"))
        );
        assert_eq!(store.get_balance(wallet_id).await.unwrap(), dec("1"));
    }

    #[tokio::test]
    async fn test_history_recorded_only_when_enabled() {
        let silent = store();
        let recording = SledBalanceStore::open_temporary(StoreConfig {
            record_history: true,
            ..StoreConfig::default()
        })
        .unwrap();
        let wallet_id = Uuid::new_v4();

        for store in [&silent, &recording] {
            store.apply_delta(wallet_id, dec("100")).await.unwrap();
            store.apply_delta(wallet_id, dec("-40")).await.unwrap();
            // Rejected updates never reach the history tree.
            let _ = store.apply_delta(wallet_id, dec("-500")).await;
        }

        assert!(silent.db().history(wallet_id).unwrap().is_empty());

        let history = recording.db().history(wallet_id).unwrap();
        let kinds: Vec<_> = history.iter().map(|r| (r.operation_type, r.amount)).collect();
        assert_eq!(
            kinds,
            vec![
                (OperationType::Deposit, dec("100")),
                (OperationType::Withdraw, dec("40")),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_deposits_into_fresh_wallet() {
        let store = Arc::new(store());
        let wallet_id = Uuid::new_v4();
        let mut handles = vec![];

        for _ in 0..200 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.apply_delta(wallet_id, Decimal::ONE).await.unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.get_balance(wallet_id).await.unwrap(), dec("200"));
    }
}
