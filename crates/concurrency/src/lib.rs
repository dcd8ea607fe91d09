//! Transaction engine for the Terrane storage core
//!
//! Provides the global transaction machinery MVCC visibility is built on:
//! - `CommitLog`: per-transaction 2-bit terminal state, monotonic
//! - `Snapshot`: the set of transactions concurrent to a transaction
//! - `Transaction`: id, snapshot, per-transaction command counter
//! - `TransactionEngine` / `SingleNodeEngine`: begin/commit/abort, the
//!   active set, and GC snapshot computation
//!
//! One short engine lock protects the transaction counter, the active set,
//! the transaction store and the WAL append of lifecycle deltas. No user
//! code runs under it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commit_log;
pub mod engine;
pub mod snapshot;
pub mod transaction;

pub use commit_log::{CommitLog, TxState};
pub use engine::{SingleNodeEngine, TransactionEngine};
pub use snapshot::Snapshot;
pub use transaction::Transaction;
