//! The transaction object
//!
//! Owned by the engine from `begin` to `commit`/`abort`; accessors hold a
//! non-owning `Arc`. The command counter partitions a transaction's own
//! writes into visibility units: versions stamped at earlier commands are
//! visible at later commands.

use crate::snapshot::Snapshot;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use terrane_core::{CmdId, StorageError, TxId};

/// A running transaction.
#[derive(Debug)]
pub struct Transaction {
    id: TxId,
    snapshot: Snapshot,
    cmd: AtomicU64,
    should_abort: AtomicBool,
}

impl Transaction {
    /// Create a transaction with the snapshot captured at begin.
    pub fn new(id: TxId, snapshot: Snapshot) -> Transaction {
        Transaction {
            id,
            snapshot,
            cmd: AtomicU64::new(CmdId::FIRST.raw()),
            should_abort: AtomicBool::new(false),
        }
    }

    /// This transaction's id.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// The snapshot captured when this transaction began.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Whether `tx` was active when this transaction began.
    pub fn in_snapshot(&self, tx: TxId) -> bool {
        self.snapshot.contains(tx)
    }

    /// Current command id.
    pub fn cmd_id(&self) -> CmdId {
        CmdId(self.cmd.load(Ordering::Acquire))
    }

    /// Advance to the next command, creating a visibility boundary.
    ///
    /// Overflow leaves the counter untouched and returns a transaction
    /// error; the transaction remains abortable.
    pub fn advance(&self) -> Result<CmdId, StorageError> {
        let next = self
            .cmd
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(1))
            .map_err(|_| StorageError::transaction("command id overflow"))?;
        Ok(CmdId(next + 1))
    }

    /// Request cooperative abort; observed at command boundaries.
    pub fn set_should_abort(&self) {
        self.should_abort.store(true, Ordering::Release);
    }

    /// Whether a cooperative abort was requested.
    pub fn should_abort(&self) -> bool {
        self.should_abort.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Transaction: Send, Sync);

    #[test]
    fn test_starts_at_first_command() {
        let tx = Transaction::new(TxId(1), Snapshot::empty());
        assert_eq!(tx.cmd_id(), CmdId::FIRST);
    }

    #[test]
    fn test_advance_is_strictly_increasing() {
        let tx = Transaction::new(TxId(1), Snapshot::empty());
        let a = tx.advance().unwrap();
        let b = tx.advance().unwrap();
        assert!(b > a);
        assert_eq!(tx.cmd_id(), b);
    }

    #[test]
    fn test_advance_overflow() {
        let tx = Transaction::new(TxId(1), Snapshot::empty());
        tx.cmd.store(u64::MAX, Ordering::Release);
        let err = tx.advance().unwrap_err();
        assert!(matches!(err, StorageError::Transaction(_)));
        // Counter untouched; the transaction can still abort cleanly
        assert_eq!(tx.cmd_id(), CmdId(u64::MAX));
    }

    #[test]
    fn test_snapshot_membership() {
        let tx = Transaction::new(TxId(5), Snapshot::from_raw(vec![TxId(2), TxId(3)]));
        assert!(tx.in_snapshot(TxId(2)));
        assert!(!tx.in_snapshot(TxId(4)));
    }

    #[test]
    fn test_should_abort_flag() {
        let tx = Transaction::new(TxId(1), Snapshot::empty());
        assert!(!tx.should_abort());
        tx.set_should_abort();
        assert!(tx.should_abort());
    }
}
