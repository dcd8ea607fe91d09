//! Vertex and edge records
//!
//! Records are the payloads of version-list nodes. A published record is
//! immutable; every mutation clones the current record, applies the change
//! and installs the clone as a new version.
//!
//! Edges refer to their endpoints by `Gid`, and a vertex's adjacency holds
//! `(edge, other_vertex, edge_type)` triples, so there are no ownership
//! cycles between records; resolution goes through the shared gid maps.

use smallvec::SmallVec;
use std::collections::BTreeMap;
use terrane_core::{EdgeTypeId, Gid, LabelId, PropertyId, PropertyValue};

/// One adjacency entry on a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    /// The edge itself.
    pub edge: Gid,
    /// The vertex on the other end.
    pub vertex: Gid,
    /// The edge's type.
    pub edge_type: EdgeTypeId,
}

/// Property storage shared by vertices and edges.
///
/// `Null` is never stored: setting a property to `Null` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: BTreeMap<PropertyId, PropertyValue>,
}

impl PropertyMap {
    /// Empty map.
    pub fn new() -> PropertyMap {
        PropertyMap::default()
    }

    /// Value of `key`, if set.
    pub fn get(&self, key: PropertyId) -> Option<&PropertyValue> {
        self.entries.get(&key)
    }

    /// Set `key` to `value`; `Null` clears the entry.
    pub fn set(&mut self, key: PropertyId, value: PropertyValue) {
        if value.is_null() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Number of set properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no properties are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A vertex record: labels, properties and adjacency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vertex {
    /// Labels on this vertex.
    pub labels: SmallVec<[LabelId; 4]>,
    /// Properties on this vertex.
    pub properties: PropertyMap,
    /// Outgoing edges.
    pub out_edges: SmallVec<[EdgeRef; 4]>,
    /// Incoming edges.
    pub in_edges: SmallVec<[EdgeRef; 4]>,
}

impl Vertex {
    /// Empty vertex.
    pub fn new() -> Vertex {
        Vertex::default()
    }

    /// Whether the vertex carries `label`.
    pub fn has_label(&self, label: LabelId) -> bool {
        self.labels.contains(&label)
    }

    /// Add `label`; returns false if it was already present.
    pub fn add_label(&mut self, label: LabelId) -> bool {
        if self.has_label(label) {
            return false;
        }
        self.labels.push(label);
        true
    }

    /// Remove `label`; returns false if it was not present.
    pub fn remove_label(&mut self, label: LabelId) -> bool {
        match self.labels.iter().position(|l| *l == label) {
            Some(at) => {
                self.labels.remove(at);
                true
            }
            None => false,
        }
    }

    /// Record an outgoing edge.
    pub fn add_out_edge(&mut self, edge: EdgeRef) {
        self.out_edges.push(edge);
    }

    /// Record an incoming edge.
    pub fn add_in_edge(&mut self, edge: EdgeRef) {
        self.in_edges.push(edge);
    }

    /// Drop the adjacency entry for `edge` from the outgoing list.
    pub fn remove_out_edge(&mut self, edge: Gid) {
        self.out_edges.retain(|e| e.edge != edge);
    }

    /// Drop the adjacency entry for `edge` from the incoming list.
    pub fn remove_in_edge(&mut self, edge: Gid) {
        self.in_edges.retain(|e| e.edge != edge);
    }

    /// Total number of incident edges (in + out).
    pub fn degree(&self) -> usize {
        self.out_edges.len() + self.in_edges.len()
    }
}

/// An edge record: endpoints, type and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Source vertex.
    pub from: Gid,
    /// Destination vertex.
    pub to: Gid,
    /// Edge type.
    pub edge_type: EdgeTypeId,
    /// Properties on this edge.
    pub properties: PropertyMap,
}

impl Edge {
    /// New edge with no properties.
    pub fn new(from: Gid, to: Gid, edge_type: EdgeTypeId) -> Edge {
        Edge {
            from,
            to,
            edge_type,
            properties: PropertyMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_map_null_clears() {
        let mut props = PropertyMap::new();
        props.set(PropertyId(1), PropertyValue::Int(5));
        assert_eq!(props.get(PropertyId(1)), Some(&PropertyValue::Int(5)));

        props.set(PropertyId(1), PropertyValue::Null);
        assert_eq!(props.get(PropertyId(1)), None);
        assert!(props.is_empty());
    }

    #[test]
    fn test_property_map_overwrite() {
        let mut props = PropertyMap::new();
        props.set(PropertyId(1), PropertyValue::Int(5));
        props.set(PropertyId(1), PropertyValue::from("five"));
        assert_eq!(props.get(PropertyId(1)), Some(&PropertyValue::from("five")));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_vertex_labels() {
        let mut v = Vertex::new();
        assert!(v.add_label(LabelId(1)));
        assert!(!v.add_label(LabelId(1)));
        assert!(v.has_label(LabelId(1)));

        assert!(v.remove_label(LabelId(1)));
        assert!(!v.remove_label(LabelId(1)));
        assert!(!v.has_label(LabelId(1)));
    }

    #[test]
    fn test_vertex_adjacency() {
        let mut v = Vertex::new();
        let e = EdgeRef {
            edge: Gid::new(0, 9),
            vertex: Gid::new(0, 2),
            edge_type: EdgeTypeId(0),
        };
        v.add_out_edge(e);
        v.add_in_edge(EdgeRef {
            edge: Gid::new(0, 10),
            vertex: Gid::new(0, 3),
            edge_type: EdgeTypeId(0),
        });
        assert_eq!(v.degree(), 2);

        v.remove_out_edge(Gid::new(0, 9));
        assert_eq!(v.degree(), 1);
        v.remove_in_edge(Gid::new(0, 10));
        assert_eq!(v.degree(), 0);
    }
}
