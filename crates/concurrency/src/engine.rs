//! The transaction engine
//!
//! `TransactionEngine` is the single interface storage and accessors talk
//! to; `SingleNodeEngine` is the local implementation. A distributed
//! deployment would put an RPC delegate behind the same trait without
//! touching the local code path.
//!
//! One short mutex protects the transaction counter, the active set, the
//! transaction store and the WAL append of lifecycle deltas. Holding the
//! lock across the append is what guarantees that begin/commit/abort
//! ordering in the log is a legal serialization.

use crate::commit_log::{CommitLog, TxState};
use crate::snapshot::Snapshot;
use crate::transaction::Transaction;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use terrane_core::{CmdId, Result, StorageError, TxId};
use terrane_durability::{StateDelta, WalWriter};
use tracing::{error, trace};

/// Callback invoked after a transaction reaches a terminal state.
pub type EndListener = Box<dyn Fn(TxId, TxState) + Send + Sync>;

/// The operations every transaction engine exposes.
pub trait TransactionEngine: Send + Sync {
    /// Start a transaction: allocate an id, capture the snapshot, enter the
    /// active set.
    fn begin(&self) -> Arc<Transaction>;

    /// Advance the command counter of a live transaction.
    fn advance(&self, tx: TxId) -> Result<CmdId>;

    /// Current command id of a live transaction without advancing it.
    fn update_command(&self, tx: TxId) -> Result<CmdId>;

    /// Commit a transaction.
    fn commit(&self, tx: &Transaction);

    /// Abort a transaction.
    fn abort(&self, tx: &Transaction);

    /// Terminal-state info from the commit log.
    fn info(&self, tx: TxId) -> TxState;

    /// Snapshot of all currently active transactions.
    fn global_active(&self) -> Snapshot;

    /// The GC snapshot: no version invisible to it can ever become visible
    /// to any present or future reader.
    fn global_gc_snapshot(&self) -> Snapshot;

    /// The most recently issued transaction id.
    fn local_last(&self) -> TxId;

    /// Call `f` with the id of every currently active transaction.
    fn for_each_active(&self, f: &mut dyn FnMut(TxId));
}

#[derive(Default)]
struct Inner {
    counter: u64,
    active: BTreeSet<TxId>,
    store: FxHashMap<TxId, Arc<Transaction>>,
}

/// Local, single-worker transaction engine.
pub struct SingleNodeEngine {
    inner: Mutex<Inner>,
    clog: CommitLog,
    wal: RwLock<Option<Arc<Mutex<WalWriter>>>>,
    listeners: RwLock<Vec<EndListener>>,
}

impl Default for SingleNodeEngine {
    fn default() -> Self {
        SingleNodeEngine::new()
    }
}

impl SingleNodeEngine {
    /// Create an engine with no WAL attached.
    pub fn new() -> SingleNodeEngine {
        SingleNodeEngine {
            inner: Mutex::new(Inner::default()),
            clog: CommitLog::new(),
            wal: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Attach the WAL; lifecycle deltas are appended from this point on.
    ///
    /// Left detached during recovery so replay does not re-log itself.
    pub fn set_wal(&self, wal: Arc<Mutex<WalWriter>>) {
        *self.wal.write() = Some(wal);
    }

    /// Register a callback fired after every commit or abort.
    pub fn add_listener(&self, listener: EndListener) {
        self.listeners.write().push(listener);
    }

    /// The commit log (shared with visibility checks).
    pub fn commit_log(&self) -> &CommitLog {
        &self.clog
    }

    /// Append a lifecycle delta while the engine lock is held.
    ///
    /// A failed append degrades durability but cannot un-happen the state
    /// transition that precedes it, so it is logged rather than surfaced.
    fn append_lifecycle(&self, delta: StateDelta) {
        if let Some(wal) = self.wal.read().as_ref() {
            if let Err(e) = wal.lock().append(&delta) {
                error!(error = %e, ?delta, "failed to append lifecycle delta");
            }
        }
    }

    fn finish(&self, tx: &Transaction, state: TxState) {
        {
            let mut inner = self.inner.lock();
            if inner.store.remove(&tx.id()).is_none() {
                // Already finished (e.g. abort after an explicit commit)
                return;
            }
            match state {
                TxState::Committed => self.clog.set_committed(tx.id()),
                TxState::Aborted => self.clog.set_aborted(tx.id()),
                _ => unreachable!("finish called with a non-terminal state"),
            }
            inner.active.remove(&tx.id());
            self.append_lifecycle(match state {
                TxState::Committed => StateDelta::TxCommit { tx: tx.id() },
                _ => StateDelta::TxAbort { tx: tx.id() },
            });
        }
        trace!(tx = %tx.id(), ?state, "transaction finished");
        for listener in self.listeners.read().iter() {
            listener(tx.id(), state);
        }
    }

    fn live(&self, tx: TxId) -> Result<Arc<Transaction>> {
        self.inner
            .lock()
            .store
            .get(&tx)
            .cloned()
            .ok_or_else(|| StorageError::transaction(format!("{tx} is not active")))
    }
}

impl TransactionEngine for SingleNodeEngine {
    fn begin(&self) -> Arc<Transaction> {
        let tx = {
            let mut inner = self.inner.lock();
            inner.counter += 1;
            let id = TxId(inner.counter);
            let snapshot = Snapshot::from_active(&inner.active);
            self.clog.set_active(id);
            inner.active.insert(id);
            let tx = Arc::new(Transaction::new(id, snapshot));
            inner.store.insert(id, Arc::clone(&tx));
            self.append_lifecycle(StateDelta::TxBegin { tx: id });
            tx
        };
        trace!(tx = %tx.id(), concurrent = tx.snapshot().len(), "transaction begun");
        tx
    }

    fn advance(&self, tx: TxId) -> Result<CmdId> {
        self.live(tx)?.advance()
    }

    fn update_command(&self, tx: TxId) -> Result<CmdId> {
        Ok(self.live(tx)?.cmd_id())
    }

    fn commit(&self, tx: &Transaction) {
        self.finish(tx, TxState::Committed);
    }

    fn abort(&self, tx: &Transaction) {
        self.finish(tx, TxState::Aborted);
    }

    fn info(&self, tx: TxId) -> TxState {
        self.clog.fetch(tx)
    }

    fn global_active(&self) -> Snapshot {
        Snapshot::from_active(&self.inner.lock().active)
    }

    fn global_gc_snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        let mut set = inner.active.clone();
        if let Some(&oldest) = inner.active.iter().next() {
            if let Some(oldest_tx) = inner.store.get(&oldest) {
                set.extend(oldest_tx.snapshot().iter());
            }
        }
        set.insert(TxId(inner.counter + 1));
        Snapshot::from_active(&set)
    }

    fn local_last(&self) -> TxId {
        TxId(self.inner.lock().counter)
    }

    fn for_each_active(&self, f: &mut dyn FnMut(TxId)) {
        // Collect under the lock, call user code outside it
        let active: Vec<TxId> = self.inner.lock().active.iter().copied().collect();
        for id in active {
            f(id);
        }
    }
}
