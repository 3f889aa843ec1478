//! Per-wallet exclusive row locks
//!
//! This module provides the `RowLocks` lock manager. Every balance update holds
//! the lock of its wallet for the whole read-modify-write, which totally orders
//! updates to one wallet while leaving different wallets independent.
//!
//! # Design
//!
//! Locks live in a `DashMap` keyed by wallet identifier, each entry an
//! `Arc<tokio::sync::Mutex<()>>`. A lock entry only exists while some task holds
//! or waits for it: the last [`RowGuard`] to drop removes the entry again.
//!
//! Waiting is bounded. A caller that cannot acquire the lock within its timeout
//! gets `WalletError::LockTimeout`, which the retry orchestrator treats as
//! transient contention.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::{WalletError, WalletId};

/// Lock manager handing out one exclusive lock per wallet
#[derive(Debug, Default)]
pub struct RowLocks {
    /// Lock per wallet with at least one holder or waiter
    locks: DashMap<WalletId, Arc<Mutex<()>>>,
}

/// Exclusive hold on one wallet row
///
/// The lock is released when the guard is dropped, on every exit path of the
/// unit holding it: commit, early error return, panic, or a cancelled future.
#[derive(Debug)]
pub struct RowGuard<'a> {
    locks: &'a RowLocks,
    wallet_id: WalletId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RowLocks {
    /// Create an empty lock manager
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the exclusive lock of a wallet row
    ///
    /// The lock does not require the wallet to exist, so two callers racing to
    /// create the same wallet are serialized like any other update.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::LockTimeout` when the lock is not acquired within
    /// `timeout`.
    pub async fn acquire(
        &self,
        wallet_id: WalletId,
        timeout: Duration,
    ) -> Result<RowGuard<'_>, WalletError> {
        // The map entry must not be held across the await below.
        let lock = Arc::clone(&*self.locks.entry(wallet_id).or_default());

        // `lock_owned` takes the handle; the timed-out future releases it before
        // the prune below.
        let acquired = tokio::time::timeout(timeout, lock.lock_owned()).await;
        match acquired {
            Ok(guard) => Ok(RowGuard {
                locks: self,
                wallet_id,
                guard: Some(guard),
            }),
            Err(_) => {
                self.prune(wallet_id);
                Err(WalletError::lock_timeout(wallet_id))
            }
        }
    }

    /// Number of wallets with a held or awaited lock
    pub fn active(&self) -> usize {
        self.locks.len()
    }

    /// Drop the lock entry of a wallet once nobody references it any more
    ///
    /// Handles are only cloned while the map shard is locked, so a strong count of
    /// one inside `remove_if` means no task holds or waits for this lock.
    fn prune(&self, wallet_id: WalletId) {
        self.locks
            .remove_if(&wallet_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl RowGuard<'_> {
    /// Wallet this guard locks
    pub fn wallet_id(&self) -> WalletId {
        self.wallet_id
    }
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        // Release first so the guard's handle no longer counts as a reference.
        drop(self.guard.take());
        self.locks.prune(self.wallet_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_guard_release_prunes_entry() {
        let locks = RowLocks::new();
        let wallet_id = Uuid::new_v4();

        let guard = locks.acquire(wallet_id, TIMEOUT).await.unwrap();
        assert_eq!(guard.wallet_id(), wallet_id);
        assert_eq!(locks.active(), 1);

        drop(guard);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_held_lock_times_out_second_caller() {
        let locks = RowLocks::new();
        let wallet_id = Uuid::new_v4();

        let _held = locks.acquire(wallet_id, TIMEOUT).await.unwrap();
        let result = locks.acquire(wallet_id, Duration::from_millis(20)).await;

        assert_eq!(result.unwrap_err(), WalletError::lock_timeout(wallet_id));
        // The holder's entry survives the failed waiter.
        assert_eq!(locks.active(), 1);
    }

    #[tokio::test]
    async fn test_different_wallets_do_not_block() {
        let locks = RowLocks::new();

        let _first = locks.acquire(Uuid::new_v4(), TIMEOUT).await.unwrap();
        let second = locks
            .acquire(Uuid::new_v4(), Duration::from_millis(20))
            .await;

        assert!(second.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_timed_out_waiter_leaves_no_entry_after_release() {
        let locks = RowLocks::new();
        let wallet_id = Uuid::new_v4();

        let held = locks.acquire(wallet_id, TIMEOUT).await.unwrap();
        assert!(locks
            .acquire(wallet_id, Duration::from_millis(5))
            .await
            .is_err());
        drop(held);

        assert_eq!(locks.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timeouts_racing_releases_leave_no_entries() {
        let locks = Arc::new(RowLocks::new());
        let wallet_id = Uuid::new_v4();
        let mut handles = vec![];

        for i in 0..200u64 {
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                // Waits close to the hold time so timeouts and releases interleave.
                let wait = Duration::from_micros(50 + (i % 5) * 25);
                if let Ok(_guard) = locks.acquire(wallet_id, wait).await {
                    tokio::time::sleep(Duration::from_micros(100)).await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(locks.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_serializes_holders() {
        let locks = Arc::new(RowLocks::new());
        let wallet_id = Uuid::new_v4();
        let inside = Arc::new(AtomicU32::new(0));
        let mut handles = vec![];

        for _ in 0..50 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(wallet_id, TIMEOUT).await.unwrap();
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(locks.active(), 0);
    }
}
