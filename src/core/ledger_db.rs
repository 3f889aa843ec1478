//! Durable wallet state on top of sled
//!
//! `LedgerDb` persists wallet balances and, when enabled, the operation history.
//!
//! # Tree Layout
//!
//! | Tree           | Key                   | Value                         |
//! |----------------|-----------------------|-------------------------------|
//! | `wallets`      | wallet id (16 bytes)  | balance (16-byte decimal)     |
//! | `transactions` | sequence id (8B BE)   | `bincode(OperationRecord)`    |
//!
//! Sequence ids come from sled's monotonic id generator and are stored big-endian
//! so that iteration order is commit order.
//!
//! # Atomicity
//!
//! [`LedgerDb::commit`] writes the balance and the optional history record in one
//! sled transaction spanning both trees. The transaction also checks that the
//! wallet row still holds the value the caller read; a mismatch aborts the whole
//! write with `WalletError::SerializationFailure`.

use rust_decimal::Decimal;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, IVec, Tree};
use std::path::Path;

use crate::types::{OperationRecord, Wallet, WalletError, WalletId};

/// One balance write, validated against the value read under the row lock
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// Wallet being written
    pub wallet_id: WalletId,

    /// Balance observed under the row lock, `None` when the row did not exist
    pub expected: Option<Decimal>,

    /// Balance to store
    pub balance: Decimal,

    /// History entry to write in the same transaction
    pub record: Option<OperationRecord>,
}

/// Abort reason for a commit whose row changed underneath it
#[derive(Debug)]
struct RowChanged;

/// Sled-backed storage for wallet rows and operation history
#[derive(Debug, Clone)]
pub struct LedgerDb {
    /// The underlying sled database handle
    db: Db,
    /// Wallet balances keyed by wallet id
    wallets: Tree,
    /// Operation history keyed by sequence id
    transactions: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a database that lives in memory and is removed when dropped
    pub fn open_temporary() -> Result<Self, WalletError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, WalletError> {
        let wallets = db.open_tree("wallets")?;
        let transactions = db.open_tree("transactions")?;

        Ok(Self {
            db,
            wallets,
            transactions,
        })
    }

    /// Read a wallet row
    ///
    /// Plain read of the committed value; never blocks on row locks.
    pub fn read_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, WalletError> {
        match self.wallets.get(wallet_id.as_bytes())? {
            Some(bytes) => Ok(Some(Wallet::new(wallet_id, decode_balance(&bytes)?))),
            None => Ok(None),
        }
    }

    /// Commit a balance write and its optional history record atomically
    ///
    /// # Errors
    ///
    /// * `SerializationFailure` - the row no longer matches `request.expected`,
    ///   including a row that appeared after it was read as absent
    /// * `Storage` / `Codec` - sled or bincode failures
    pub fn commit(&self, request: &CommitRequest) -> Result<(), WalletError> {
        let key = request.wallet_id.as_bytes();
        let expected = request.expected.map(|balance| balance.serialize());
        let value = request.balance.serialize();
        let record = request
            .record
            .as_ref()
            .map(bincode::serialize)
            .transpose()?;

        let result = (&self.wallets, &self.transactions).transaction(|(wallets, transactions)| {
            let current = wallets.get(key)?;
            if current.as_deref() != expected.as_ref().map(|bytes| &bytes[..]) {
                return Err(ConflictableTransactionError::Abort(RowChanged));
            }

            wallets.insert(&key[..], &value[..])?;

            if let Some(bytes) = &record {
                let id = transactions.generate_id()?;
                transactions.insert(&id.to_be_bytes()[..], bytes.as_slice())?;
            }

            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(RowChanged)) => {
                Err(WalletError::serialization_failure(request.wallet_id))
            }
            Err(TransactionError::Storage(error)) => Err(error.into()),
        }
    }

    /// History entries of one wallet, in commit order
    pub fn history(&self, wallet_id: WalletId) -> Result<Vec<OperationRecord>, WalletError> {
        let mut records = Vec::new();

        for entry in self.transactions.iter() {
            let (_, bytes) = entry?;
            let record: OperationRecord = bincode::deserialize(&bytes)?;
            if record.wallet_id == wallet_id {
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Number of wallet rows
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// Force all pending writes to disk
    pub fn flush(&self) -> Result<(), WalletError> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_balance(bytes: &IVec) -> Result<Decimal, WalletError> {
    let raw: [u8; 16] = bytes[..].try_into().map_err(|_| {
        WalletError::codec(format!(
            "stored balance has {} bytes, expected 16",
            bytes.len()
        ))
    })?;
    Ok(Decimal::deserialize(raw))
}
