//! Name ↔ id registries
//!
//! Labels, edge types and property keys are interned into dense ids. The
//! maps grow monotonically and are lock-free; a losing race on insertion
//! wastes one id but never assigns two ids to the same name.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU16, Ordering};
use terrane_core::{EdgeTypeId, LabelId, PropertyId};

/// A dense id type mintable by a registry.
pub trait RegistryId: Copy + Eq + Hash {
    /// Construct from a raw value.
    fn from_raw(raw: u16) -> Self;
    /// The raw value.
    fn raw(self) -> u16;
}

impl RegistryId for LabelId {
    fn from_raw(raw: u16) -> Self {
        LabelId(raw)
    }
    fn raw(self) -> u16 {
        self.0
    }
}

impl RegistryId for EdgeTypeId {
    fn from_raw(raw: u16) -> Self {
        EdgeTypeId(raw)
    }
    fn raw(self) -> u16 {
        self.0
    }
}

impl RegistryId for PropertyId {
    fn from_raw(raw: u16) -> Self {
        PropertyId(raw)
    }
    fn raw(self) -> u16 {
        self.0
    }
}

/// Bidirectional, monotonically growing name ↔ id map.
#[derive(Debug)]
pub struct NameIdRegistry<I: RegistryId> {
    name_to_id: DashMap<String, I>,
    id_to_name: DashMap<I, String>,
    next: AtomicU16,
}

impl<I: RegistryId> NameIdRegistry<I> {
    /// Empty registry.
    pub fn new() -> NameIdRegistry<I> {
        NameIdRegistry {
            name_to_id: DashMap::new(),
            id_to_name: DashMap::new(),
            next: AtomicU16::new(0),
        }
    }

    /// The id for `name`, minting one if the name is new.
    ///
    /// Thread-safe and idempotent: concurrent calls for the same name all
    /// return the same id, with at most one id burned per race.
    pub fn get_or_create(&self, name: &str) -> I {
        if let Some(existing) = self.name_to_id.get(name) {
            return *existing;
        }

        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        assert!(raw != u16::MAX, "name registry exhausted");
        let id = I::from_raw(raw);

        // Publish the reverse mapping before the forward one so that any id
        // observable through name_to_id resolves back to its name
        self.id_to_name.insert(id, name.to_string());
        match self.name_to_id.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                // Lost the race; our id is wasted
                self.id_to_name.remove(&id);
                *entry.get()
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(id);
                id
            }
        }
    }

    /// The id for `name`, if it was ever interned.
    pub fn get(&self, name: &str) -> Option<I> {
        self.name_to_id.get(name).map(|id| *id)
    }

    /// The name behind `id`.
    ///
    /// Panics on an unknown id: the registry is append-only, so an id that
    /// resolves nowhere is a logic error, not a data condition.
    pub fn name(&self, id: I) -> String {
        self.id_to_name
            .get(&id)
            .map(|name| name.clone())
            .expect("id minted by this registry")
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_round_trip() {
        let registry: NameIdRegistry<LabelId> = NameIdRegistry::new();
        let id = registry.get_or_create("Person");
        assert_eq!(registry.name(id), "Person");
        assert_eq!(registry.get("Person"), Some(id));
        assert_eq!(registry.get("Animal"), None);
    }

    #[test]
    fn test_idempotent() {
        let registry: NameIdRegistry<PropertyId> = NameIdRegistry::new();
        let a = registry.get_or_create("age");
        let b = registry.get_or_create("age");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_names_distinct_ids() {
        let registry: NameIdRegistry<LabelId> = NameIdRegistry::new();
        let a = registry.get_or_create("A");
        let b = registry.get_or_create("B");
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    #[should_panic(expected = "minted by this registry")]
    fn test_unknown_id_panics() {
        let registry: NameIdRegistry<LabelId> = NameIdRegistry::new();
        registry.name(LabelId(7));
    }

    #[test]
    fn test_concurrent_no_double_assignment() {
        let registry: Arc<NameIdRegistry<LabelId>> = Arc::new(NameIdRegistry::new());
        let names = ["A", "B", "C", "D"];

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..50 {
                    for name in names {
                        ids.push((name, registry.get_or_create(name)));
                    }
                }
                ids
            }));
        }

        let mut by_name = std::collections::HashMap::new();
        for handle in handles {
            for (name, id) in handle.join().unwrap() {
                let entry = by_name.entry(name).or_insert(id);
                assert_eq!(*entry, id, "name {name} got two ids");
            }
        }
        assert_eq!(registry.len(), names.len());
        for (name, id) in by_name {
            assert_eq!(registry.name(id), name);
        }
    }
}
