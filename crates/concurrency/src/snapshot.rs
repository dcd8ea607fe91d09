//! Transaction snapshots
//!
//! A `Snapshot` is the set of transactions that were active at the moment a
//! transaction began. It is captured under the engine lock and immutable for
//! the transaction's lifetime: a reader never sees a version created by any
//! transaction in its snapshot, regardless of wall-clock commit order.

use std::collections::BTreeSet;
use terrane_core::TxId;

/// An immutable, sorted set of transaction ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    ids: Vec<TxId>,
}

impl Snapshot {
    /// Empty snapshot (no concurrent transactions).
    pub fn empty() -> Snapshot {
        Snapshot::default()
    }

    /// Snapshot of the given active set.
    pub fn from_active(active: &BTreeSet<TxId>) -> Snapshot {
        Snapshot {
            ids: active.iter().copied().collect(),
        }
    }

    /// Rebuild from raw ids (durability); sorts and deduplicates.
    pub fn from_raw(mut raw: Vec<TxId>) -> Snapshot {
        raw.sort_unstable();
        raw.dedup();
        Snapshot { ids: raw }
    }

    /// Whether `tx` was active when this snapshot was taken.
    pub fn contains(&self, tx: TxId) -> bool {
        self.ids.binary_search(&tx).is_ok()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of transactions in the snapshot.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Oldest transaction in the snapshot.
    pub fn min(&self) -> Option<TxId> {
        self.ids.first().copied()
    }

    /// Iterate ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TxId> + '_ {
        self.ids.iter().copied()
    }

    /// The ids as a slice.
    pub fn as_slice(&self) -> &[TxId] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Snapshot: Send, Sync);

    #[test]
    fn test_empty() {
        let s = Snapshot::empty();
        assert!(s.is_empty());
        assert!(!s.contains(TxId(1)));
        assert_eq!(s.min(), None);
    }

    #[test]
    fn test_from_active() {
        let mut active = BTreeSet::new();
        active.insert(TxId(5));
        active.insert(TxId(2));
        active.insert(TxId(9));

        let s = Snapshot::from_active(&active);
        assert_eq!(s.len(), 3);
        assert_eq!(s.min(), Some(TxId(2)));
        assert!(s.contains(TxId(5)));
        assert!(!s.contains(TxId(3)));
    }

    #[test]
    fn test_from_raw_sorts_and_dedups() {
        let s = Snapshot::from_raw(vec![TxId(7), TxId(3), TxId(7)]);
        assert_eq!(s.as_slice(), &[TxId(3), TxId(7)]);
    }

    #[test]
    fn test_iter_ascending() {
        let s = Snapshot::from_raw(vec![TxId(4), TxId(1), TxId(8)]);
        let collected: Vec<_> = s.iter().collect();
        assert_eq!(collected, vec![TxId(1), TxId(4), TxId(8)]);
    }
}
