//! The accessor: storage API bound to one transaction
//!
//! Every read and write goes through an `Accessor`. Reads resolve gids
//! through the shared maps and walk version chains with the transaction's
//! visibility; writes install new record versions, feed the indexes with
//! the new current version, and append data deltas to the WAL.
//!
//! An accessor is single-threaded, checks liveness on every operation, and
//! aborts its transaction if dropped without an explicit commit or abort.

use crate::graph::Shared;
use std::cell::Cell;
use std::ops::Bound;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::Duration;
use terrane_concurrency::{Transaction, TransactionEngine};
use terrane_core::{CmdId, Gid, PropertyValue, Result, StorageError, TxId};
use terrane_durability::StateDelta;
use terrane_storage::{
    Edge, EdgeRef, LabelPropertyKey, Lookup, Vertex, VersionList, VersionNode, View,
};
use tracing::trace;

/// How long an index build sleeps between polls of the engine while waiting
/// for pre-existing writers to finish.
const INDEX_BUILD_POLL: Duration = Duration::from_millis(1);

/// Storage API handle for one transaction.
pub struct Accessor<'a> {
    shared: &'a Shared,
    tx: Arc<Transaction>,
    finished: Cell<bool>,
}

/// A vertex as visible to an accessor's transaction.
pub struct VertexView<'a> {
    accessor: &'a Accessor<'a>,
    gid: Gid,
    node: Arc<VersionNode<Vertex>>,
}

impl<'a> std::fmt::Debug for VertexView<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexView").field("gid", &self.gid).finish()
    }
}

/// An edge as visible to an accessor's transaction.
pub struct EdgeView<'a> {
    accessor: &'a Accessor<'a>,
    gid: Gid,
    node: Arc<VersionNode<Edge>>,
}

impl<'a> Accessor<'a> {
    pub(crate) fn new(shared: &'a Shared) -> Accessor<'a> {
        Accessor {
            shared,
            tx: shared.engine.begin(),
            finished: Cell::new(false),
        }
    }

    /// The transaction this accessor is bound to.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn check(&self) -> Result<()> {
        if self.finished.get() {
            return Err(StorageError::transaction(
                "accessor already committed or aborted",
            ));
        }
        Ok(())
    }

    fn check_local(&self, gid: Gid) -> Result<()> {
        if gid.worker_id() != self.shared.vertex_gids.worker_id() {
            return Err(StorageError::NotYetImplemented(
                "operations on records owned by another worker",
            ));
        }
        Ok(())
    }

    fn wal_append(&self, delta: StateDelta) -> Result<()> {
        if let Some(wal) = self.shared.wal.read().as_ref() {
            wal.lock().append(&delta)?;
        }
        Ok(())
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Insert a new vertex, generating a gid unless one is supplied.
    ///
    /// Explicitly inserting a gid that already exists is an invariant
    /// violation.
    pub fn insert_vertex(&self, requested: Option<Gid>) -> Result<VertexView<'_>> {
        self.check()?;
        let gid = match requested {
            Some(gid) => {
                self.check_local(gid)?;
                self.shared.vertex_gids.note_used(gid);
                gid
            }
            None => self.shared.vertex_gids.next(),
        };

        let list = Arc::new(VersionList::new(gid, Vertex::new(), &self.tx));
        match self.shared.vertices.entry(gid) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StorageError::fatal(format!(
                    "vertex {gid} inserted twice"
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&list));
            }
        }
        self.wal_append(StateDelta::CreateVertex {
            tx: self.tx.id(),
            gid,
        })?;
        trace!(tx = %self.tx.id(), %gid, "vertex inserted");

        Ok(VertexView {
            accessor: self,
            gid,
            node: list.head(),
        })
    }

    /// Insert a new edge between two existing vertices.
    pub fn insert_edge(
        &self,
        from: Gid,
        to: Gid,
        edge_type: &str,
        requested: Option<Gid>,
    ) -> Result<EdgeView<'_>> {
        self.check()?;
        self.check_local(from)?;
        self.check_local(to)?;

        let from_list = self.vertex_list(from)?;
        let to_list = self.vertex_list(to)?;
        let type_id = self.shared.edge_types.get_or_create(edge_type);

        let gid = match requested {
            Some(gid) => {
                self.check_local(gid)?;
                self.shared.edge_gids.note_used(gid);
                gid
            }
            None => self.shared.edge_gids.next(),
        };

        let list = Arc::new(VersionList::new(gid, Edge::new(from, to, type_id), &self.tx));
        match self.shared.edges.entry(gid) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StorageError::fatal(format!("edge {gid} inserted twice")));
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&list));
            }
        }

        from_list.update(&self.shared.engine, &self.tx, |v| {
            v.add_out_edge(EdgeRef {
                edge: gid,
                vertex: to,
                edge_type: type_id,
            })
        })?;
        to_list.update(&self.shared.engine, &self.tx, |v| {
            v.add_in_edge(EdgeRef {
                edge: gid,
                vertex: from,
                edge_type: type_id,
            })
        })?;

        self.wal_append(StateDelta::CreateEdge {
            tx: self.tx.id(),
            gid,
            from,
            to,
            edge_type: edge_type.to_string(),
        })?;
        trace!(tx = %self.tx.id(), %gid, %from, %to, "edge inserted");

        Ok(EdgeView {
            accessor: self,
            gid,
            node: list.head(),
        })
    }

    // =========================================================================
    // Lookup and iteration
    // =========================================================================

    fn vertex_list(&self, gid: Gid) -> Result<Arc<VersionList<Vertex>>> {
        self.shared
            .vertices
            .get(&gid)
            .map(|list| Arc::clone(&list))
            .ok_or_else(|| StorageError::transaction(format!("vertex {gid} does not exist")))
    }

    fn edge_list(&self, gid: Gid) -> Result<Arc<VersionList<Edge>>> {
        self.shared
            .edges
            .get(&gid)
            .map(|list| Arc::clone(&list))
            .ok_or_else(|| StorageError::transaction(format!("edge {gid} does not exist")))
    }

    /// Find the vertex visible under `view`, if any.
    ///
    /// A current-view read of a vertex this transaction deleted surfaces
    /// the deletion as an error rather than silently returning nothing.
    pub fn find_vertex(&self, gid: Gid, view: View) -> Result<Option<VertexView<'_>>> {
        self.check()?;
        self.check_local(gid)?;
        let list = match self.shared.vertices.get(&gid) {
            Some(list) => Arc::clone(&list),
            None => return Ok(None),
        };
        match list.find_visible(&self.shared.engine, &self.tx, view) {
            Lookup::Visible(node) => Ok(Some(VertexView {
                accessor: self,
                gid,
                node,
            })),
            Lookup::DeletedBySelf if view == View::Current => Err(StorageError::RecordDeleted),
            _ => Ok(None),
        }
    }

    /// Find the edge visible under `view`, if any.
    pub fn find_edge(&self, gid: Gid, view: View) -> Result<Option<EdgeView<'_>>> {
        self.check()?;
        self.check_local(gid)?;
        let list = match self.shared.edges.get(&gid) {
            Some(list) => Arc::clone(&list),
            None => return Ok(None),
        };
        match list.find_visible(&self.shared.engine, &self.tx, view) {
            Lookup::Visible(node) => Ok(Some(EdgeView {
                accessor: self,
                gid,
                node,
            })),
            Lookup::DeletedBySelf if view == View::Current => Err(StorageError::RecordDeleted),
            _ => Ok(None),
        }
    }

    fn resolve_vertices(
        &self,
        gids: Vec<Gid>,
        view: View,
    ) -> impl Iterator<Item = VertexView<'_>> + '_ {
        gids.into_iter().filter_map(move |gid| {
            let list = self.shared.vertices.get(&gid).map(|l| Arc::clone(&l))?;
            list.find_visible(&self.shared.engine, &self.tx, view)
                .visible()
                .map(|node| VertexView {
                    accessor: self,
                    gid,
                    node,
                })
        })
    }

    /// Iterate all visible vertices.
    pub fn vertices(&self, view: View) -> impl Iterator<Item = VertexView<'_>> + '_ {
        let gids: Vec<Gid> = self.shared.vertices.iter().map(|e| *e.key()).collect();
        self.resolve_vertices(gids, view)
    }

    /// Iterate visible vertices carrying `label`, via the label index.
    pub fn vertices_with_label(
        &self,
        label: &str,
        view: View,
    ) -> impl Iterator<Item = VertexView<'_>> + '_ {
        let gids = match self.shared.labels.get(label) {
            Some(label_id) => self.shared.label_index.gids(label_id),
            None => Vec::new(),
        };
        let label_id = self.shared.labels.get(label);
        self.resolve_vertices(gids, view)
            .filter(move |v| label_id.is_some_and(|id| v.node.record.has_label(id)))
    }

    fn ready_index(&self, label: &str, property: &str) -> Result<(LabelPropertyKey, Arc<terrane_storage::IndexContainer>)> {
        let key = LabelPropertyKey {
            label: self
                .shared
                .labels
                .get(label)
                .ok_or_else(|| StorageError::transaction(format!("no index on :{label}({property})")))?,
            property: self
                .shared
                .properties
                .get(property)
                .ok_or_else(|| StorageError::transaction(format!("no index on :{label}({property})")))?,
        };
        let container = self
            .shared
            .lp_index
            .get(key)
            .ok_or_else(|| StorageError::transaction(format!("no index on :{label}({property})")))?;
        if !container.is_ready() {
            return Err(StorageError::transaction(format!(
                "index on :{label}({property}) is still building"
            )));
        }
        Ok((key, container))
    }

    /// Iterate visible vertices with `label` and any non-null `property`,
    /// via the label-property index.
    pub fn vertices_with_label_property(
        &self,
        label: &str,
        property: &str,
        view: View,
    ) -> Result<impl Iterator<Item = VertexView<'_>> + '_> {
        let (key, container) = self.ready_index(label, property)?;
        Ok(self
            .resolve_vertices(container.gids(), view)
            .filter(move |v| {
                v.node.record.has_label(key.label) && v.node.record.properties.get(key.property).is_some()
            }))
    }

    /// Iterate visible vertices whose indexed `property` equals `value`.
    pub fn vertices_with_label_property_value(
        &self,
        label: &str,
        property: &str,
        value: &PropertyValue,
        view: View,
    ) -> Result<impl Iterator<Item = VertexView<'_>> + '_> {
        let (key, container) = self.ready_index(label, property)?;
        let value = value.clone();
        Ok(self
            .resolve_vertices(container.gids_for_value(&value), view)
            .filter(move |v| {
                v.node.record.has_label(key.label)
                    && v.node.record.properties.get(key.property) == Some(&value)
            }))
    }

    /// Iterate visible vertices whose indexed `property` falls in the range.
    pub fn vertices_with_label_property_range(
        &self,
        label: &str,
        property: &str,
        lower: Bound<&PropertyValue>,
        upper: Bound<&PropertyValue>,
        view: View,
    ) -> Result<impl Iterator<Item = VertexView<'_>> + '_> {
        let (key, container) = self.ready_index(label, property)?;
        let gids = container.gids_in_range(lower, upper);
        let lower = lower.cloned();
        let upper = upper.cloned();
        Ok(self.resolve_vertices(gids, view).filter(move |v| {
            v.node.record.has_label(key.label)
                && v.node
                    .record
                    .properties
                    .get(key.property)
                    .is_some_and(|value| within(value, &lower, &upper))
        }))
    }

    /// Iterate all visible edges.
    pub fn edges(&self, view: View) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        let gids: Vec<Gid> = self.shared.edges.iter().map(|e| *e.key()).collect();
        gids.into_iter().filter_map(move |gid| {
            let list = self.shared.edges.get(&gid).map(|l| Arc::clone(&l))?;
            list.find_visible(&self.shared.engine, &self.tx, view)
                .visible()
                .map(|node| EdgeView {
                    accessor: self,
                    gid,
                    node,
                })
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Add `label` to a vertex and feed the indexes.
    pub fn add_label(&self, gid: Gid, label: &str) -> Result<()> {
        self.check()?;
        self.check_local(gid)?;
        let label_id = self.shared.labels.get_or_create(label);
        let list = self.vertex_list(gid)?;
        let node = list.update(&self.shared.engine, &self.tx, |v| {
            v.add_label(label_id);
        })?;

        self.shared.label_index.add(label_id, gid);
        for (property, value) in node.record.properties.iter() {
            self.shared.lp_index.add(
                LabelPropertyKey {
                    label: label_id,
                    property,
                },
                value.clone(),
                gid,
            );
        }

        self.wal_append(StateDelta::AddLabel {
            tx: self.tx.id(),
            gid,
            label: label.to_string(),
        })
    }

    /// Remove `label` from a vertex.
    ///
    /// Index entries are not withdrawn; readers re-check the visible record
    /// and the cleaner prunes stale entries.
    pub fn remove_label(&self, gid: Gid, label: &str) -> Result<()> {
        self.check()?;
        self.check_local(gid)?;
        let label_id = self.shared.labels.get_or_create(label);
        let list = self.vertex_list(gid)?;
        list.update(&self.shared.engine, &self.tx, |v| {
            v.remove_label(label_id);
        })?;

        self.wal_append(StateDelta::RemoveLabel {
            tx: self.tx.id(),
            gid,
            label: label.to_string(),
        })
    }

    /// Set a vertex property; `Null` clears it. Feeds every matching
    /// label-property index with the new current version.
    pub fn set_property(&self, gid: Gid, property: &str, value: PropertyValue) -> Result<()> {
        self.check()?;
        self.check_local(gid)?;
        let property_id = self.shared.properties.get_or_create(property);
        let list = self.vertex_list(gid)?;
        let stored = value.clone();
        let node = list.update(&self.shared.engine, &self.tx, |v| {
            v.properties.set(property_id, stored);
        })?;

        if !value.is_null() {
            for label in &node.record.labels {
                self.shared.lp_index.add(
                    LabelPropertyKey {
                        label: *label,
                        property: property_id,
                    },
                    value.clone(),
                    gid,
                );
            }
        }

        self.wal_append(StateDelta::SetVertexProperty {
            tx: self.tx.id(),
            gid,
            property: property.to_string(),
            value,
        })
    }

    /// Set an edge property; `Null` clears it.
    pub fn set_edge_property(&self, gid: Gid, property: &str, value: PropertyValue) -> Result<()> {
        self.check()?;
        self.check_local(gid)?;
        let property_id = self.shared.properties.get_or_create(property);
        let list = self.edge_list(gid)?;
        let stored = value.clone();
        list.update(&self.shared.engine, &self.tx, |e| {
            e.properties.set(property_id, stored);
        })?;

        self.wal_append(StateDelta::SetEdgeProperty {
            tx: self.tx.id(),
            gid,
            property: property.to_string(),
            value,
        })
    }

    /// Remove a vertex with no incident edges.
    ///
    /// Returns false without mutating anything if any incident edge is
    /// still visible; detach first or use `detach_remove_vertex`.
    pub fn remove_vertex(&self, gid: Gid) -> Result<bool> {
        self.check()?;
        self.check_local(gid)?;
        let list = self.vertex_list(gid)?;
        match list.find_visible(&self.shared.engine, &self.tx, View::Current) {
            Lookup::Visible(node) => {
                if node.record.degree() > 0 {
                    return Ok(false);
                }
                list.remove(&self.shared.engine, &self.tx)?;
                self.wal_append(StateDelta::RemoveVertex {
                    tx: self.tx.id(),
                    gid,
                })?;
                Ok(true)
            }
            Lookup::DeletedBySelf => Ok(true),
            Lookup::NotVisible => Err(StorageError::RecordDeleted),
        }
    }

    /// Remove a vertex together with all of its incident edges.
    pub fn detach_remove_vertex(&self, gid: Gid) -> Result<()> {
        self.check()?;
        self.check_local(gid)?;
        let list = self.vertex_list(gid)?;
        let node = match list.find_visible(&self.shared.engine, &self.tx, View::Current) {
            Lookup::Visible(node) => node,
            Lookup::DeletedBySelf => return Ok(()),
            Lookup::NotVisible => return Err(StorageError::RecordDeleted),
        };

        // The vertex itself is expired whole, so its own adjacency needs no
        // updates; only the far endpoints do (and not for self-loops)
        for edge in node.record.out_edges.clone() {
            self.remove_edge_impl(edge.edge, false, edge.vertex != gid)?;
        }
        for edge in node.record.in_edges.clone() {
            self.remove_edge_impl(edge.edge, edge.vertex != gid, false)?;
        }

        list.remove(&self.shared.engine, &self.tx)?;
        self.wal_append(StateDelta::RemoveVertex {
            tx: self.tx.id(),
            gid,
        })
    }

    /// Remove an edge, updating both endpoint adjacencies.
    pub fn remove_edge(&self, gid: Gid) -> Result<()> {
        self.check()?;
        self.check_local(gid)?;
        self.remove_edge_impl(gid, true, true)
    }

    fn remove_edge_impl(&self, gid: Gid, update_from: bool, update_to: bool) -> Result<()> {
        let list = self.edge_list(gid)?;
        let node = match list.find_visible(&self.shared.engine, &self.tx, View::Current) {
            Lookup::Visible(node) => node,
            // Already removed by this transaction (e.g. a detach loop saw it
            // from both endpoints)
            Lookup::DeletedBySelf => return Ok(()),
            Lookup::NotVisible => return Err(StorageError::RecordDeleted),
        };
        let (from, to) = (node.record.from, node.record.to);

        list.remove(&self.shared.engine, &self.tx)?;
        if update_from {
            let from_list = self.vertex_list(from)?;
            from_list.update(&self.shared.engine, &self.tx, |v| v.remove_out_edge(gid))?;
        }
        if update_to {
            let to_list = self.vertex_list(to)?;
            to_list.update(&self.shared.engine, &self.tx, |v| v.remove_in_edge(gid))?;
        }

        self.wal_append(StateDelta::RemoveEdge {
            tx: self.tx.id(),
            gid,
        })
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    /// Build a (label, property) index online, without blocking writers.
    ///
    /// Writers that begin after the index is installed insert into it on
    /// their write path; the build waits for every writer that predates the
    /// installation, then scans with a fresh reader transaction and marks
    /// the index ready.
    pub fn build_index(&self, label: &str, property: &str) -> Result<()> {
        self.check()?;
        let key = LabelPropertyKey {
            label: self.shared.labels.get_or_create(label),
            property: self.shared.properties.get_or_create(property),
        };

        self.shared.index_builders.insert(self.tx.id());
        let result = self.build_index_inner(key, label, property);
        self.shared.index_builders.remove(&self.tx.id());
        result
    }

    fn build_index_inner(&self, key: LabelPropertyKey, label: &str, property: &str) -> Result<()> {
        let container = match self.shared.lp_index.create(key) {
            Some(container) => container,
            None => {
                return Err(StorageError::IndexExists {
                    label: label.to_string(),
                    property: property.to_string(),
                })
            }
        };

        // Writers that began before the index existed may still produce
        // versions this index would miss; wait them out, skipping other
        // index builders so concurrent builds cannot block each other
        let waiting: Vec<TxId> = self
            .shared
            .engine
            .global_active()
            .iter()
            .filter(|id| *id != self.tx.id() && !self.shared.index_builders.contains(id))
            .collect();
        for id in waiting {
            while self.shared.engine.info(id).is_active() {
                std::thread::sleep(INDEX_BUILD_POLL);
            }
        }

        // A fresh reader sees every write that predates the waiting phase;
        // registering it in the building set keeps it from blocking itself
        // against other builds
        let reader = Accessor::new(self.shared);
        self.shared.index_builders.insert(reader.tx.id());
        for entry in self.shared.vertices.iter() {
            let gid = *entry.key();
            if let Some(node) =
                entry
                    .value()
                    .find_visible(&self.shared.engine, &reader.tx, View::Current)
                    .visible()
            {
                if node.record.has_label(key.label) {
                    if let Some(value) = node.record.properties.get(key.property) {
                        container.add(value.clone(), gid);
                    }
                }
            }
        }
        self.shared.index_builders.remove(&reader.tx.id());
        reader.commit()?;

        container.mark_ready();
        self.wal_append(StateDelta::BuildIndex {
            tx: self.tx.id(),
            label: label.to_string(),
            property: property.to_string(),
        })?;
        trace!(label, property, "index built");
        Ok(())
    }

    /// Names of all existing (label, property) indexes.
    pub fn index_info(&self) -> Vec<(String, String)> {
        self.shared
            .lp_index
            .keys()
            .into_iter()
            .map(|key| {
                (
                    self.shared.labels.name(key.label),
                    self.shared.properties.name(key.property),
                )
            })
            .collect()
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Number of stored vertices (all visibilities).
    pub fn vertices_count(&self) -> usize {
        self.shared.vertices.len()
    }

    /// Number of label-index entries for `label` (may include stale ones).
    pub fn vertices_count_with_label(&self, label: &str) -> usize {
        match self.shared.labels.get(label) {
            Some(label_id) => self.shared.label_index.count(label_id),
            None => 0,
        }
    }

    /// Number of entries in the (label, property) index.
    pub fn vertices_count_with_label_property(&self, label: &str, property: &str) -> Result<usize> {
        let (_, container) = self.ready_index(label, property)?;
        Ok(container.count())
    }

    /// Number of index entries equal to `value`.
    pub fn vertices_count_for_value(
        &self,
        label: &str,
        property: &str,
        value: &PropertyValue,
    ) -> Result<usize> {
        let (_, container) = self.ready_index(label, property)?;
        Ok(container.position_and_count(value).1)
    }

    /// `(lower_bound_position, equal_run_length)` of `value` in the index.
    pub fn position_and_count(
        &self,
        label: &str,
        property: &str,
        value: &PropertyValue,
    ) -> Result<(usize, usize)> {
        let (_, container) = self.ready_index(label, property)?;
        Ok(container.position_and_count(value))
    }

    /// Number of index entries within the bounds.
    pub fn vertices_count_in_range(
        &self,
        label: &str,
        property: &str,
        lower: Bound<&PropertyValue>,
        upper: Bound<&PropertyValue>,
    ) -> Result<usize> {
        let (_, container) = self.ready_index(label, property)?;
        Ok(container.range_count(lower, upper))
    }

    // =========================================================================
    // Transaction control
    // =========================================================================

    /// Advance the command id, making earlier writes visible to later reads.
    ///
    /// This is also where cooperative cancellation is observed.
    pub fn advance_command(&self) -> Result<CmdId> {
        self.check()?;
        if self.tx.should_abort() {
            return Err(StorageError::transaction("transaction was asked to abort"));
        }
        self.tx.advance()
    }

    /// Atomic fetch-add on the named storage counter; returns the previous
    /// value.
    pub fn counter(&self, name: &str, step: i64) -> i64 {
        self.shared
            .counters
            .entry(name.to_string())
            .or_insert_with(|| std::sync::atomic::AtomicI64::new(0))
            .fetch_add(step, AtomicOrdering::SeqCst)
    }

    /// Commit the transaction.
    pub fn commit(&self) -> Result<()> {
        self.check()?;
        self.finished.set(true);
        self.shared.engine.commit(&self.tx);
        Ok(())
    }

    /// Abort the transaction.
    pub fn abort(&self) -> Result<()> {
        self.check()?;
        self.finished.set(true);
        self.shared.engine.abort(&self.tx);
        Ok(())
    }
}

impl Drop for Accessor<'_> {
    fn drop(&mut self) {
        if !self.finished.get() {
            trace!(tx = %self.tx.id(), "aborting abandoned accessor");
            self.shared.engine.abort(&self.tx);
        }
    }
}

fn within(value: &PropertyValue, lower: &Bound<PropertyValue>, upper: &Bound<PropertyValue>) -> bool {
    let lower_ok = match lower {
        Bound::Included(bound) => value >= bound,
        Bound::Excluded(bound) => value > bound,
        Bound::Unbounded => true,
    };
    let upper_ok = match upper {
        Bound::Included(bound) => value <= bound,
        Bound::Excluded(bound) => value < bound,
        Bound::Unbounded => true,
    };
    lower_ok && upper_ok
}

impl VertexView<'_> {
    /// The vertex id.
    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// Label names on the visible version.
    pub fn labels(&self) -> Vec<String> {
        self.node
            .record
            .labels
            .iter()
            .map(|id| self.accessor.shared.labels.name(*id))
            .collect()
    }

    /// Whether the visible version carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.accessor
            .shared
            .labels
            .get(label)
            .is_some_and(|id| self.node.record.has_label(id))
    }

    /// Value of `property` on the visible version.
    pub fn property(&self, property: &str) -> Option<PropertyValue> {
        let id = self.accessor.shared.properties.get(property)?;
        self.node.record.properties.get(id).cloned()
    }

    /// All properties on the visible version, by name.
    pub fn properties(&self) -> Vec<(String, PropertyValue)> {
        self.node
            .record
            .properties
            .iter()
            .map(|(id, value)| (self.accessor.shared.properties.name(id), value.clone()))
            .collect()
    }

    /// Outgoing adjacency of the visible version.
    pub fn out_edges(&self) -> Vec<EdgeRef> {
        self.node.record.out_edges.to_vec()
    }

    /// Incoming adjacency of the visible version.
    pub fn in_edges(&self) -> Vec<EdgeRef> {
        self.node.record.in_edges.to_vec()
    }
}

impl EdgeView<'_> {
    /// The edge id.
    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// Source vertex.
    pub fn from(&self) -> Gid {
        self.node.record.from
    }

    /// Destination vertex.
    pub fn to(&self) -> Gid {
        self.node.record.to
    }

    /// Edge type name.
    pub fn edge_type(&self) -> String {
        self.accessor
            .shared
            .edge_types
            .name(self.node.record.edge_type)
    }

    /// Value of `property` on the visible version.
    pub fn property(&self, property: &str) -> Option<PropertyValue> {
        let id = self.accessor.shared.properties.get(property)?;
        self.node.record.properties.get(id).cloned()
    }

    /// All properties on the visible version, by name.
    pub fn properties(&self) -> Vec<(String, PropertyValue)> {
        self.node
            .record
            .properties
            .iter()
            .map(|(id, value)| (self.accessor.shared.properties.name(id), value.clone()))
            .collect()
    }
}
