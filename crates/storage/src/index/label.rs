//! Label index
//!
//! Maps a label to the set of vertices that have carried it in any
//! uncollected version.

use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use terrane_core::{Gid, LabelId};

/// label → set of vertex gids.
#[derive(Debug, Default)]
pub struct LabelIndex {
    map: DashMap<LabelId, Arc<DashSet<Gid>>>,
}

impl LabelIndex {
    /// Empty index.
    pub fn new() -> LabelIndex {
        LabelIndex::default()
    }

    /// Record that `gid` currently carries `label`.
    pub fn add(&self, label: LabelId, gid: Gid) {
        self.map.entry(label).or_default().insert(gid);
    }

    /// Snapshot of the gids recorded under `label`.
    ///
    /// Callers must re-check visibility; entries go stale between cleaner
    /// runs.
    pub fn gids(&self, label: LabelId) -> Vec<Gid> {
        match self.map.get(&label) {
            Some(set) => set.iter().map(|gid| *gid).collect(),
            None => Vec::new(),
        }
    }

    /// Number of entries recorded under `label` (including stale ones).
    pub fn count(&self, label: LabelId) -> usize {
        self.map.get(&label).map(|set| set.len()).unwrap_or(0)
    }

    /// Drop every entry for which `dead` returns true.
    pub fn clean<F>(&self, dead: F)
    where
        F: Fn(LabelId, Gid) -> bool,
    {
        for entry in self.map.iter() {
            let label = *entry.key();
            let set = Arc::clone(entry.value());
            let stale: Vec<Gid> = set
                .iter()
                .filter(|gid| dead(label, **gid))
                .map(|gid| *gid)
                .collect();
            for gid in stale {
                set.remove(&gid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_list() {
        let index = LabelIndex::new();
        index.add(LabelId(1), Gid::new(0, 10));
        index.add(LabelId(1), Gid::new(0, 11));
        index.add(LabelId(2), Gid::new(0, 10));

        let mut gids = index.gids(LabelId(1));
        gids.sort();
        assert_eq!(gids, vec![Gid::new(0, 10), Gid::new(0, 11)]);
        assert_eq!(index.count(LabelId(2)), 1);
        assert_eq!(index.count(LabelId(3)), 0);
    }

    #[test]
    fn test_add_is_idempotent() {
        let index = LabelIndex::new();
        index.add(LabelId(1), Gid::new(0, 10));
        index.add(LabelId(1), Gid::new(0, 10));
        assert_eq!(index.count(LabelId(1)), 1);
    }

    #[test]
    fn test_clean() {
        let index = LabelIndex::new();
        index.add(LabelId(1), Gid::new(0, 10));
        index.add(LabelId(1), Gid::new(0, 11));

        index.clean(|_, gid| gid == Gid::new(0, 10));
        assert_eq!(index.gids(LabelId(1)), vec![Gid::new(0, 11)]);
    }
}
