//! Version lists and MVCC visibility
//!
//! A `VersionList` is the single mutation point for one entity. Each node in
//! the chain carries the creating (tx, cmd) stamp, an expiring (tx, cmd)
//! stamp installed later, and a pointer to the next older version.
//!
//! Readers clone the head `Arc` and traverse the chain without locks;
//! visibility of each node is decided against the commit log and the
//! reader's snapshot. Writers serialize on the head lock of the one list
//! they touch; the expiration stamp itself is installed with a
//! compare-exchange, so the first writer to stamp a version wins and the
//! loser surfaces a serialization failure.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use terrane_concurrency::{Transaction, TransactionEngine};
use terrane_core::{CmdId, Gid, Result, StorageError, TxId};

/// Which state of the graph a read observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The state as of the current command: includes the reading
    /// transaction's writes up to and including the current command.
    Current,
    /// The state before the current command: the reading transaction's
    /// writes at the current command are not yet visible.
    Old,
}

/// One version of a record.
#[derive(Debug)]
pub struct VersionNode<R> {
    /// Transaction that created this version.
    pub tx_created: TxId,
    /// Command at which this version was created.
    pub cmd_created: CmdId,
    tx_expired: AtomicU64,
    cmd_expired: AtomicU64,
    /// The record payload; immutable once the node is published.
    pub record: R,
    /// Next older version.
    pub next: Option<Arc<VersionNode<R>>>,
}

impl<R> VersionNode<R> {
    fn new(record: R, tx: TxId, cmd: CmdId, next: Option<Arc<VersionNode<R>>>) -> VersionNode<R> {
        VersionNode {
            tx_created: tx,
            cmd_created: cmd,
            tx_expired: AtomicU64::new(0),
            cmd_expired: AtomicU64::new(0),
            record,
            next,
        }
    }

    /// The expiring (tx, cmd) stamp; `(TxId::NONE, CmdId::NONE)` while the
    /// version is current.
    ///
    /// The command stamp is written before the transaction stamp is
    /// published, so a reader that observes the transaction also observes
    /// its command.
    pub fn expiration(&self) -> (TxId, CmdId) {
        let tx = self.tx_expired.load(Ordering::Acquire);
        (TxId(tx), CmdId(self.cmd_expired.load(Ordering::Relaxed)))
    }
}

impl<R: Clone> VersionNode<R> {
    /// Copy of this node with a different tail, preserving both stamps.
    fn clone_with_next(&self, next: Option<Arc<VersionNode<R>>>) -> VersionNode<R> {
        let (etx, ecmd) = self.expiration();
        VersionNode {
            tx_created: self.tx_created,
            cmd_created: self.cmd_created,
            tx_expired: AtomicU64::new(etx.raw()),
            cmd_expired: AtomicU64::new(ecmd.raw()),
            record: self.record.clone(),
            next,
        }
    }
}

/// Outcome of a visibility lookup.
#[derive(Debug)]
pub enum Lookup<R> {
    /// Exactly this version is visible.
    Visible(Arc<VersionNode<R>>),
    /// The newest reachable version was expired by the reading transaction
    /// itself (a current-view read of a self-deleted record).
    DeletedBySelf,
    /// No version is visible.
    NotVisible,
}

impl<R> Lookup<R> {
    /// The visible node, if any.
    pub fn visible(self) -> Option<Arc<VersionNode<R>>> {
        match self {
            Lookup::Visible(node) => Some(node),
            _ => None,
        }
    }
}

/// An entity's chain of record versions.
#[derive(Debug)]
pub struct VersionList<R> {
    gid: Gid,
    head: RwLock<Arc<VersionNode<R>>>,
}

impl<R: Clone> VersionList<R> {
    /// Create a list whose first version is stamped by `tx` at its current
    /// command.
    pub fn new(gid: Gid, record: R, tx: &Transaction) -> VersionList<R> {
        VersionList {
            gid,
            head: RwLock::new(Arc::new(VersionNode::new(record, tx.id(), tx.cmd_id(), None))),
        }
    }

    /// The entity id this list belongs to.
    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// Snapshot of the newest version pointer.
    pub fn head(&self) -> Arc<VersionNode<R>> {
        Arc::clone(&self.head.read())
    }

    fn creation_visible(
        engine: &dyn TransactionEngine,
        tx: &Transaction,
        node: &VersionNode<R>,
        view: View,
    ) -> bool {
        if node.tx_created == tx.id() {
            // Own writes: the command boundary decides
            match view {
                View::Current => node.cmd_created <= tx.cmd_id(),
                View::Old => node.cmd_created < tx.cmd_id(),
            }
        } else {
            // Foreign writes: ids are monotonic, so "committed, not in my
            // snapshot and older than me" means it committed before I began
            engine.info(node.tx_created).is_committed()
                && !tx.in_snapshot(node.tx_created)
                && node.tx_created < tx.id()
        }
    }

    fn expiration_hides(
        engine: &dyn TransactionEngine,
        tx: &Transaction,
        node: &VersionNode<R>,
        view: View,
    ) -> bool {
        let (etx, ecmd) = node.expiration();
        if etx.is_none() {
            return false;
        }
        if etx == tx.id() {
            match view {
                View::Current => ecmd <= tx.cmd_id(),
                View::Old => ecmd < tx.cmd_id(),
            }
        } else {
            engine.info(etx).is_committed() && !tx.in_snapshot(etx) && etx < tx.id()
        }
    }

    fn find_from(
        mut node: Option<&Arc<VersionNode<R>>>,
        engine: &dyn TransactionEngine,
        tx: &Transaction,
        view: View,
    ) -> Lookup<R> {
        while let Some(current) = node {
            if Self::creation_visible(engine, tx, current, view) {
                if !Self::expiration_hides(engine, tx, current, view) {
                    return Lookup::Visible(Arc::clone(current));
                }
                // The newest version this transaction can reach is expired
                // for it; older versions are expired by construction
                return if current.expiration().0 == tx.id() {
                    Lookup::DeletedBySelf
                } else {
                    Lookup::NotVisible
                };
            }
            node = current.next.as_ref();
        }
        Lookup::NotVisible
    }

    /// Find the version visible to `tx` under `view`.
    pub fn find_visible(
        &self,
        engine: &dyn TransactionEngine,
        tx: &Transaction,
        view: View,
    ) -> Lookup<R> {
        let head = self.head();
        Self::find_from(Some(&head), engine, tx, view)
    }

    /// Install an expiration stamp on `node` for `tx`.
    ///
    /// Stamps left behind by aborted transactions are reclaimed; any other
    /// existing stamp means a concurrent writer won and the caller loses
    /// with a serialization failure. Callers hold the head write lock, so
    /// stamp installs on this list are serialized; the compare-exchange is
    /// what arbitrates against stamps published by earlier transactions.
    fn try_expire(
        engine: &dyn TransactionEngine,
        node: &VersionNode<R>,
        tx: &Transaction,
    ) -> Result<()> {
        loop {
            let current = node.tx_expired.load(Ordering::Acquire);
            if current == tx.id().raw() {
                return Ok(());
            }
            if current != 0 && !engine.info(TxId(current)).is_aborted() {
                return Err(StorageError::Serialization);
            }
            node.cmd_expired.store(tx.cmd_id().raw(), Ordering::Relaxed);
            if node
                .tx_expired
                .compare_exchange(current, tx.id().raw(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Create a new version by mutating a clone of the visible record.
    ///
    /// A version this transaction created and has not expired is replaced in
    /// place (new-new coalesce), so double modification within one
    /// transaction stays idempotent. Otherwise the visible version's
    /// expiration stamp is claimed and the mutated clone becomes the new
    /// head.
    pub fn update<F>(
        &self,
        engine: &dyn TransactionEngine,
        tx: &Transaction,
        mutate: F,
    ) -> Result<Arc<VersionNode<R>>>
    where
        F: FnOnce(&mut R),
    {
        let mut head = self.head.write();
        let node = match Self::find_from(Some(&*head), engine, tx, View::Current) {
            Lookup::Visible(node) => node,
            Lookup::DeletedBySelf | Lookup::NotVisible => return Err(StorageError::RecordDeleted),
        };

        if node.tx_created == tx.id() && node.expiration().0.is_none() {
            // Private uncommitted version; replace it outright
            debug_assert!(Arc::ptr_eq(&node, &*head), "private version must be the head");
            let mut record = node.record.clone();
            mutate(&mut record);
            let replacement = Arc::new(VersionNode::new(
                record,
                node.tx_created,
                node.cmd_created,
                node.next.clone(),
            ));
            *head = Arc::clone(&replacement);
            return Ok(replacement);
        }

        Self::try_expire(engine, &node, tx)?;
        let mut record = node.record.clone();
        mutate(&mut record);
        let new_head = Arc::new(VersionNode::new(
            record,
            tx.id(),
            tx.cmd_id(),
            Some(Arc::clone(&*head)),
        ));
        *head = Arc::clone(&new_head);
        Ok(new_head)
    }

    /// Logically remove the entity: expire the visible version with no
    /// successor. Removing twice in the same transaction is a no-op.
    pub fn remove(&self, engine: &dyn TransactionEngine, tx: &Transaction) -> Result<()> {
        let head = self.head.write();
        let node = match Self::find_from(Some(&*head), engine, tx, View::Current) {
            Lookup::Visible(node) => node,
            Lookup::DeletedBySelf => return Ok(()),
            Lookup::NotVisible => return Err(StorageError::RecordDeleted),
        };
        Self::try_expire(engine, &node, tx)
    }

    /// Prune versions no possible reader can see.
    ///
    /// `watermark` is the minimum of the GC snapshot: every transaction
    /// below it has finished, and no present or future reader can exclude
    /// it from its visible set. Versions created by aborted transactions
    /// are unlinked wherever they sit; the suffix starting at the first
    /// version whose expirer committed below the watermark is dropped
    /// whole. Returns true when nothing remains and the owner should drop
    /// the list itself.
    pub fn gc(&self, engine: &dyn TransactionEngine, watermark: TxId) -> bool {
        let mut head = self.head.write();

        let mut kept: Vec<Arc<VersionNode<R>>> = Vec::new();
        let mut dropped = 0usize;
        let mut node = Some(Arc::clone(&*head));
        while let Some(current) = node {
            let next = current.next.clone();
            if engine.info(current.tx_created).is_aborted() {
                dropped += 1;
                node = next;
                continue;
            }
            let (etx, _) = current.expiration();
            if !etx.is_none() && etx < watermark && engine.info(etx).is_committed() {
                // Expired before every possible reader; everything older is
                // unreachable through it as well
                dropped += 1;
                let mut rest = next;
                while let Some(older) = rest {
                    dropped += 1;
                    rest = older.next.clone();
                }
                node = None;
                continue;
            }
            kept.push(current);
            node = next;
        }

        if kept.is_empty() {
            return true;
        }
        if dropped == 0 {
            return false;
        }

        // Rebuild the chain oldest-first; concurrent readers keep the old
        // chain alive through their own head Arcs
        let mut rebuilt: Option<Arc<VersionNode<R>>> = None;
        for node in kept.iter().rev() {
            rebuilt = Some(Arc::new(node.clone_with_next(rebuilt)));
        }
        *head = rebuilt.expect("kept is non-empty");
        false
    }

    /// Whether any version in the chain satisfies `f`.
    ///
    /// Index cleaners use this to decide if an entry still has a backing
    /// version; staleness is tolerated because readers re-check visibility.
    pub fn any_version<F>(&self, f: F) -> bool
    where
        F: Fn(&R) -> bool,
    {
        let mut node = Some(self.head());
        while let Some(current) = node {
            if f(&current.record) {
                return true;
            }
            node = current.next.clone();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use terrane_concurrency::SingleNodeEngine;

    assert_impl_all!(VersionList<i64>: Send, Sync);
    assert_impl_all!(View: Send, Sync);

    fn list_with_value(
        engine: &SingleNodeEngine,
        value: i64,
    ) -> (VersionList<i64>, Arc<Transaction>) {
        let tx = engine.begin();
        let list = VersionList::new(Gid::new(0, 1), value, &tx);
        (list, tx)
    }

    #[test]
    fn test_own_writes_visible_current_view() {
        let engine = SingleNodeEngine::new();
        let (list, tx) = list_with_value(&engine, 1);

        match list.find_visible(&engine, &tx, View::Current) {
            Lookup::Visible(node) => assert_eq!(node.record, 1),
            other => panic!("expected visible, got {other:?}"),
        }
        // Old view at the creating command does not see the write yet
        assert!(matches!(
            list.find_visible(&engine, &tx, View::Old),
            Lookup::NotVisible
        ));

        // After advancing, the old view sees it too
        tx.advance().unwrap();
        assert!(list.find_visible(&engine, &tx, View::Old).visible().is_some());
        engine.commit(&tx);
    }

    #[test]
    fn test_uncommitted_invisible_to_others() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        let t2 = engine.begin();
        assert!(matches!(
            list.find_visible(&engine, &t2, View::Current),
            Lookup::NotVisible
        ));
        engine.commit(&t1);
        engine.abort(&t2);
    }

    #[test]
    fn test_commit_after_begin_stays_invisible() {
        let engine = SingleNodeEngine::new();
        let t_reader = engine.begin();
        let (list, t_writer) = list_with_value(&engine, 1);
        engine.commit(&t_writer);

        // Writer committed after the reader began; still invisible
        assert!(matches!(
            list.find_visible(&engine, &t_reader, View::Current),
            Lookup::NotVisible
        ));

        // A transaction begun after the commit sees it
        let t_later = engine.begin();
        assert!(list
            .find_visible(&engine, &t_later, View::Current)
            .visible()
            .is_some());
        engine.abort(&t_reader);
        engine.abort(&t_later);
    }

    #[test]
    fn test_snapshot_member_invisible() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        // t2 begins while t1 is active, so t1 is in t2's snapshot
        let t2 = engine.begin();
        engine.commit(&t1);
        assert!(matches!(
            list.find_visible(&engine, &t2, View::Current),
            Lookup::NotVisible
        ));
        engine.abort(&t2);
    }

    #[test]
    fn test_aborted_writes_invisible() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.abort(&t1);

        let t2 = engine.begin();
        assert!(matches!(
            list.find_visible(&engine, &t2, View::Current),
            Lookup::NotVisible
        ));
        engine.abort(&t2);
    }

    #[test]
    fn test_update_creates_new_version() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        list.update(&engine, &t2, |v| *v = 2).unwrap();

        // Writer sees its own new version; a snapshot-isolated reader that
        // began before the commit still sees the old one
        let t3 = engine.begin();
        engine.commit(&t2);
        match list.find_visible(&engine, &t3, View::Current) {
            Lookup::Visible(node) => assert_eq!(node.record, 1),
            other => panic!("expected old version, got {other:?}"),
        }
        let t4 = engine.begin();
        match list.find_visible(&engine, &t4, View::Current) {
            Lookup::Visible(node) => assert_eq!(node.record, 2),
            other => panic!("expected new version, got {other:?}"),
        }
        engine.abort(&t3);
        engine.abort(&t4);
    }

    #[test]
    fn test_same_tx_update_coalesces() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        list.update(&engine, &t2, |v| *v = 2).unwrap();
        list.update(&engine, &t2, |v| *v = 3).unwrap();

        // One private version, not a chain of three
        let head = list.head();
        assert_eq!(head.record, 3);
        assert_eq!(head.tx_created, t2.id());
        let older = head.next.as_ref().expect("committed base version");
        assert_eq!(older.record, 1);
        assert!(older.next.is_none());
        engine.commit(&t2);
    }

    #[test]
    fn test_write_write_conflict() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        let t3 = engine.begin();
        list.update(&engine, &t2, |v| *v = 2).unwrap();

        // First stamp wins; the loser must abort
        let err = list.update(&engine, &t3, |v| *v = 3).unwrap_err();
        assert!(err.is_serialization());
        engine.abort(&t3);
        engine.commit(&t2);
    }

    #[test]
    fn test_conflict_with_committed_overwrite() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        let t3 = engine.begin();
        list.update(&engine, &t2, |v| *v = 2).unwrap();
        engine.commit(&t2);

        // t2 committed after t3 began: t3 still sees version 1, but the
        // stamp on it belongs to a committed transaction
        let err = list.update(&engine, &t3, |v| *v = 3).unwrap_err();
        assert!(err.is_serialization());
        engine.abort(&t3);
    }

    #[test]
    fn test_aborted_stamp_reclaimed() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        list.update(&engine, &t2, |v| *v = 2).unwrap();
        engine.abort(&t2);

        let t3 = engine.begin();
        list.update(&engine, &t3, |v| *v = 3).unwrap();
        engine.commit(&t3);

        let t4 = engine.begin();
        assert_eq!(
            list.find_visible(&engine, &t4, View::Current)
                .visible()
                .unwrap()
                .record,
            3
        );
        engine.abort(&t4);
    }

    #[test]
    fn test_remove_and_deleted_by_self() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        list.remove(&engine, &t2).unwrap();
        assert!(matches!(
            list.find_visible(&engine, &t2, View::Current),
            Lookup::DeletedBySelf
        ));
        // Removing again is a no-op
        list.remove(&engine, &t2).unwrap();

        // A concurrent reader still sees the record
        let t3 = engine.begin();
        engine.commit(&t2);
        assert!(list
            .find_visible(&engine, &t3, View::Current)
            .visible()
            .is_some());
        engine.abort(&t3);

        // After the removing commit, later readers see nothing
        let t4 = engine.begin();
        assert!(matches!(
            list.find_visible(&engine, &t4, View::Current),
            Lookup::NotVisible
        ));
        engine.abort(&t4);
    }

    #[test]
    fn test_update_after_own_remove_fails() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        list.remove(&engine, &t2).unwrap();
        let err = list.update(&engine, &t2, |v| *v = 9).unwrap_err();
        assert!(matches!(err, StorageError::RecordDeleted));
        engine.abort(&t2);
    }

    #[test]
    fn test_gc_prunes_old_versions() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);
        for value in 2..=4 {
            let tx = engine.begin();
            list.update(&engine, &tx, |v| *v = value).unwrap();
            engine.commit(&tx);
        }

        // No active readers: everything but the newest version is prunable
        let watermark = engine.global_gc_snapshot().min().unwrap();
        assert!(!list.gc(&engine, watermark));
        let head = list.head();
        assert_eq!(head.record, 4);
        assert!(head.next.is_none());
    }

    #[test]
    fn test_gc_respects_active_readers() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let reader = engine.begin();
        let t2 = engine.begin();
        list.update(&engine, &t2, |v| *v = 2).unwrap();
        engine.commit(&t2);

        // The reader still needs version 1
        let watermark = engine.global_gc_snapshot().min().unwrap();
        assert!(!list.gc(&engine, watermark));
        assert_eq!(
            list.find_visible(&engine, &reader, View::Current)
                .visible()
                .unwrap()
                .record,
            1
        );
        engine.abort(&reader);
    }

    #[test]
    fn test_gc_drops_fully_deleted_list() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);

        let t2 = engine.begin();
        list.remove(&engine, &t2).unwrap();
        engine.commit(&t2);

        let watermark = engine.global_gc_snapshot().min().unwrap();
        assert!(list.gc(&engine, watermark), "list should be dead");
    }

    #[test]
    fn test_gc_drops_aborted_creation() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.abort(&t1);

        let watermark = engine.global_gc_snapshot().min().unwrap();
        assert!(list.gc(&engine, watermark));
    }

    #[test]
    fn test_any_version() {
        let engine = SingleNodeEngine::new();
        let (list, t1) = list_with_value(&engine, 1);
        engine.commit(&t1);
        let t2 = engine.begin();
        list.update(&engine, &t2, |v| *v = 2).unwrap();
        engine.commit(&t2);

        assert!(list.any_version(|v| *v == 1));
        assert!(list.any_version(|v| *v == 2));
        assert!(!list.any_version(|v| *v == 3));
    }

    #[test]
    fn test_concurrent_writers_single_winner() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        for _ in 0..20 {
            let engine = Arc::new(SingleNodeEngine::new());
            let t0 = engine.begin();
            let list = Arc::new(VersionList::new(Gid::new(0, 1), 0i64, &t0));
            engine.commit(&t0);

            // All writers begin before any of them race, so they are
            // pairwise concurrent and at most one stamp can land
            let txs: Vec<_> = (0..4).map(|_| engine.begin()).collect();

            let wins = Arc::new(AtomicUsize::new(0));
            let mut handles = Vec::new();
            for (i, tx) in txs.into_iter().enumerate() {
                let i = i as i64 + 1;
                let engine = Arc::clone(&engine);
                let list = Arc::clone(&list);
                let wins = Arc::clone(&wins);
                handles.push(std::thread::spawn(move || {
                    match list.update(&*engine, &tx, |v| *v = i) {
                        Ok(_) => {
                            wins.fetch_add(1, Ordering::SeqCst);
                            engine.commit(&tx);
                        }
                        Err(e) => {
                            assert!(e.is_serialization());
                            engine.abort(&tx);
                        }
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(wins.load(Ordering::SeqCst), 1, "exactly one writer wins");
        }
    }
}
