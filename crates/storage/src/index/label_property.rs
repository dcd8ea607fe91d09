//! Label-property index
//!
//! Maps a (label, property) pair to an ordered container of (value, gid)
//! entries keyed by the total value ordering. Supports existence checks,
//! counts, `position_and_count` for a value, and range counts with
//! inclusive/exclusive bounds.
//!
//! `Null` values are never indexed; passing `Null` as a value or range
//! bound is an invariant violation and asserts.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use terrane_core::{Gid, LabelId, PropertyId, PropertyValue};

/// Key of a label-property index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelPropertyKey {
    /// Indexed label.
    pub label: LabelId,
    /// Indexed property.
    pub property: PropertyId,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexEntry {
    value: PropertyValue,
    gid: Gid,
}

fn lower_entry_bound(bound: Bound<&PropertyValue>) -> Bound<IndexEntry> {
    match bound {
        Bound::Included(value) => {
            assert!(!value.is_null(), "null range bound");
            Bound::Included(IndexEntry {
                value: value.clone(),
                gid: Gid::MIN,
            })
        }
        Bound::Excluded(value) => {
            assert!(!value.is_null(), "null range bound");
            Bound::Excluded(IndexEntry {
                value: value.clone(),
                gid: Gid::MAX,
            })
        }
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn upper_entry_bound(bound: Bound<&PropertyValue>) -> Bound<IndexEntry> {
    match bound {
        Bound::Included(value) => {
            assert!(!value.is_null(), "null range bound");
            Bound::Included(IndexEntry {
                value: value.clone(),
                gid: Gid::MAX,
            })
        }
        Bound::Excluded(value) => {
            assert!(!value.is_null(), "null range bound");
            Bound::Excluded(IndexEntry {
                value: value.clone(),
                gid: Gid::MIN,
            })
        }
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// The ordered entries of one label-property index.
#[derive(Debug, Default)]
pub struct IndexContainer {
    entries: RwLock<BTreeSet<IndexEntry>>,
    ready: AtomicBool,
}

impl IndexContainer {
    /// Whether the online build has finished.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Mark the online build finished.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Insert an entry.
    pub fn add(&self, value: PropertyValue, gid: Gid) {
        assert!(!value.is_null(), "null values are never indexed");
        self.entries.write().insert(IndexEntry { value, gid });
    }

    /// Total number of entries (including stale ones).
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// `(lower_bound_position, equal_run_length)` of `value` in the total
    /// order.
    pub fn position_and_count(&self, value: &PropertyValue) -> (usize, usize) {
        assert!(!value.is_null(), "null values are never indexed");
        let entries = self.entries.read();
        let position = entries
            .range((Bound::Unbounded, lower_entry_bound(Bound::Included(value))))
            .count();
        let run = entries
            .range((
                lower_entry_bound(Bound::Included(value)),
                upper_entry_bound(Bound::Included(value)),
            ))
            .count();
        (position, run)
    }

    /// Number of entries whose value falls within the bounds.
    pub fn range_count(&self, lower: Bound<&PropertyValue>, upper: Bound<&PropertyValue>) -> usize {
        self.entries
            .read()
            .range((lower_entry_bound(lower), upper_entry_bound(upper)))
            .count()
    }

    /// Gids of every entry, in value order.
    pub fn gids(&self) -> Vec<Gid> {
        self.entries.read().iter().map(|e| e.gid).collect()
    }

    /// Gids of entries equal to `value`.
    pub fn gids_for_value(&self, value: &PropertyValue) -> Vec<Gid> {
        assert!(!value.is_null(), "null values are never indexed");
        self.entries
            .read()
            .range((
                lower_entry_bound(Bound::Included(value)),
                upper_entry_bound(Bound::Included(value)),
            ))
            .map(|e| e.gid)
            .collect()
    }

    /// Gids of entries whose value falls within the bounds, in value order.
    pub fn gids_in_range(
        &self,
        lower: Bound<&PropertyValue>,
        upper: Bound<&PropertyValue>,
    ) -> Vec<Gid> {
        self.entries
            .read()
            .range((lower_entry_bound(lower), upper_entry_bound(upper)))
            .map(|e| e.gid)
            .collect()
    }

    fn clean<F>(&self, dead: F)
    where
        F: Fn(&PropertyValue, Gid) -> bool,
    {
        let mut entries = self.entries.write();
        entries.retain(|entry| !dead(&entry.value, entry.gid));
    }
}

/// (label, property) → ordered index container.
#[derive(Debug, Default)]
pub struct LabelPropertyIndex {
    map: DashMap<LabelPropertyKey, Arc<IndexContainer>>,
}

impl LabelPropertyIndex {
    /// Empty index family.
    pub fn new() -> LabelPropertyIndex {
        LabelPropertyIndex::default()
    }

    /// Install a new index atomically.
    ///
    /// Returns `None` if an index for `key` already exists; the caller maps
    /// that to an index-exists error with resolved names.
    pub fn create(&self, key: LabelPropertyKey) -> Option<Arc<IndexContainer>> {
        match self.map.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let container = Arc::new(IndexContainer::default());
                entry.insert(Arc::clone(&container));
                Some(container)
            }
        }
    }

    /// The container for `key`, if the index exists.
    pub fn get(&self, key: LabelPropertyKey) -> Option<Arc<IndexContainer>> {
        self.map.get(&key).map(|c| Arc::clone(&c))
    }

    /// Whether an index for `key` exists.
    pub fn exists(&self, key: LabelPropertyKey) -> bool {
        self.map.contains_key(&key)
    }

    /// Insert an entry into an existing index; a missing index is a no-op.
    pub fn add(&self, key: LabelPropertyKey, value: PropertyValue, gid: Gid) {
        if let Some(container) = self.map.get(&key) {
            container.add(value, gid);
        }
    }

    /// Keys of all existing indexes.
    pub fn keys(&self) -> Vec<LabelPropertyKey> {
        self.map.iter().map(|entry| *entry.key()).collect()
    }

    /// Drop every entry for which `dead` returns true.
    pub fn clean<F>(&self, dead: F)
    where
        F: Fn(LabelPropertyKey, &PropertyValue, Gid) -> bool,
    {
        for entry in self.map.iter() {
            let key = *entry.key();
            entry.value().clean(|value, gid| dead(key, value, gid));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LabelPropertyKey {
        LabelPropertyKey {
            label: LabelId(0),
            property: PropertyId(0),
        }
    }

    fn populated() -> LabelPropertyIndex {
        let index = LabelPropertyIndex::new();
        index.create(key()).unwrap();
        index.add(key(), PropertyValue::Int(1), Gid::new(0, 1));
        index.add(key(), PropertyValue::Int(2), Gid::new(0, 2));
        index.add(key(), PropertyValue::Int(2), Gid::new(0, 3));
        index.add(key(), PropertyValue::Int(5), Gid::new(0, 4));
        index
    }

    #[test]
    fn test_create_is_exclusive() {
        let index = LabelPropertyIndex::new();
        assert!(index.create(key()).is_some());
        assert!(index.create(key()).is_none());
        assert!(index.exists(key()));
    }

    #[test]
    fn test_count() {
        let index = populated();
        assert_eq!(index.get(key()).unwrap().count(), 4);
    }

    #[test]
    fn test_position_and_count() {
        let index = populated();
        let container = index.get(key()).unwrap();
        assert_eq!(container.position_and_count(&PropertyValue::Int(1)), (0, 1));
        assert_eq!(container.position_and_count(&PropertyValue::Int(2)), (1, 2));
        assert_eq!(container.position_and_count(&PropertyValue::Int(3)), (3, 0));
        assert_eq!(container.position_and_count(&PropertyValue::Int(5)), (3, 1));
        assert_eq!(container.position_and_count(&PropertyValue::Int(9)), (4, 0));
    }

    #[test]
    fn test_range_count_bounds() {
        let index = populated();
        let container = index.get(key()).unwrap();
        let two = PropertyValue::Int(2);
        let five = PropertyValue::Int(5);

        assert_eq!(
            container.range_count(Bound::Included(&two), Bound::Included(&five)),
            3
        );
        assert_eq!(
            container.range_count(Bound::Excluded(&two), Bound::Included(&five)),
            1
        );
        assert_eq!(
            container.range_count(Bound::Included(&two), Bound::Excluded(&five)),
            2
        );
        assert_eq!(container.range_count(Bound::Unbounded, Bound::Excluded(&two)), 1);
        assert_eq!(container.range_count(Bound::Unbounded, Bound::Unbounded), 4);
    }

    #[test]
    fn test_numeric_class_spans_int_and_double() {
        let index = LabelPropertyIndex::new();
        index.create(key()).unwrap();
        index.add(key(), PropertyValue::Int(10), Gid::new(0, 1));
        index.add(key(), PropertyValue::Double(10.5), Gid::new(0, 2));
        index.add(key(), PropertyValue::Int(11), Gid::new(0, 3));

        let container = index.get(key()).unwrap();
        let lo = PropertyValue::Int(10);
        let hi = PropertyValue::Double(11.0);
        assert_eq!(
            container.range_count(Bound::Excluded(&lo), Bound::Included(&hi)),
            2
        );
    }

    #[test]
    fn test_gids_for_value() {
        let index = populated();
        let container = index.get(key()).unwrap();
        let mut gids = container.gids_for_value(&PropertyValue::Int(2));
        gids.sort();
        assert_eq!(gids, vec![Gid::new(0, 2), Gid::new(0, 3)]);
    }

    #[test]
    fn test_ready_flag() {
        let index = LabelPropertyIndex::new();
        let container = index.create(key()).unwrap();
        assert!(!container.is_ready());
        container.mark_ready();
        assert!(index.get(key()).unwrap().is_ready());
    }

    #[test]
    fn test_clean() {
        let index = populated();
        index.clean(|_, _, gid| gid == Gid::new(0, 2));
        assert_eq!(index.get(key()).unwrap().count(), 3);
        assert_eq!(
            index
                .get(key())
                .unwrap()
                .gids_for_value(&PropertyValue::Int(2)),
            vec![Gid::new(0, 3)]
        );
    }

    #[test]
    #[should_panic(expected = "null values are never indexed")]
    fn test_null_value_asserts() {
        let index = populated();
        index.add(key(), PropertyValue::Null, Gid::new(0, 9));
    }

    #[test]
    #[should_panic(expected = "null range bound")]
    fn test_null_bound_asserts() {
        let index = populated();
        index
            .get(key())
            .unwrap()
            .range_count(Bound::Included(&PropertyValue::Null), Bound::Unbounded);
    }

    #[test]
    fn test_missing_index_add_is_noop() {
        let index = LabelPropertyIndex::new();
        index.add(key(), PropertyValue::Int(1), Gid::new(0, 1));
        assert!(index.get(key()).is_none());
    }
}
