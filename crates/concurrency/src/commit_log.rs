//! Commit log
//!
//! Tracks the terminal state of every transaction ever begun, two bits per
//! transaction in a growable packed word vector. Visibility checks consult
//! it on every version-chain walk, so `fetch` takes only a read lock;
//! state changes happen under the engine lock and take the write lock
//! briefly.
//!
//! States are monotonic: once a transaction is committed or aborted it never
//! changes again.

use parking_lot::RwLock;
use terrane_core::TxId;

/// Terminal state of a transaction as recorded in the commit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TxState {
    /// The transaction id has not been issued (or predates this log).
    Unknown = 0,
    /// Begun and neither committed nor aborted.
    Active = 1,
    /// Committed.
    Committed = 2,
    /// Aborted.
    Aborted = 3,
}

impl TxState {
    fn from_bits(bits: u64) -> TxState {
        match bits & 0b11 {
            0 => TxState::Unknown,
            1 => TxState::Active,
            2 => TxState::Committed,
            _ => TxState::Aborted,
        }
    }

    /// Whether the transaction is still running.
    pub fn is_active(self) -> bool {
        self == TxState::Active
    }

    /// Whether the transaction committed.
    pub fn is_committed(self) -> bool {
        self == TxState::Committed
    }

    /// Whether the transaction aborted.
    pub fn is_aborted(self) -> bool {
        self == TxState::Aborted
    }

    /// Whether the transaction reached a terminal state.
    pub fn is_finished(self) -> bool {
        self.is_committed() || self.is_aborted()
    }
}

const STATES_PER_WORD: u64 = 32;

/// Packed per-transaction state log.
#[derive(Debug, Default)]
pub struct CommitLog {
    words: RwLock<Vec<u64>>,
}

impl CommitLog {
    /// Create an empty log.
    pub fn new() -> CommitLog {
        CommitLog::default()
    }

    /// State of `tx`.
    pub fn fetch(&self, tx: TxId) -> TxState {
        let words = self.words.read();
        let word = (tx.raw() / STATES_PER_WORD) as usize;
        match words.get(word) {
            Some(w) => TxState::from_bits(w >> ((tx.raw() % STATES_PER_WORD) * 2)),
            None => TxState::Unknown,
        }
    }

    fn set(&self, tx: TxId, state: TxState) {
        debug_assert!(!tx.is_none(), "commit log entry for the null transaction");
        let word = (tx.raw() / STATES_PER_WORD) as usize;
        let shift = (tx.raw() % STATES_PER_WORD) * 2;

        let mut words = self.words.write();
        if words.len() <= word {
            words.resize(word + 1, 0);
        }
        debug_assert!(
            !TxState::from_bits(words[word] >> shift).is_finished(),
            "commit log state for {tx} is terminal"
        );
        words[word] = (words[word] & !(0b11 << shift)) | ((state as u64) << shift);
    }

    /// Mark `tx` as begun.
    pub fn set_active(&self, tx: TxId) {
        self.set(tx, TxState::Active);
    }

    /// Mark `tx` as committed.
    pub fn set_committed(&self, tx: TxId) {
        self.set(tx, TxState::Committed);
    }

    /// Mark `tx` as aborted.
    pub fn set_aborted(&self, tx: TxId) {
        self.set(tx, TxState::Aborted);
    }
}
