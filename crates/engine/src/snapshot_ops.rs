//! Snapshot creation
//!
//! Streams the graph visible to a fresh transaction into a snapshot file:
//! generator high-water marks, the snapshotting transaction and its
//! snapshot set, the index list, then all vertices and all edges.

use crate::accessor::Accessor;
use crate::graph::Shared;
use std::path::{Path, PathBuf};
use terrane_core::{PropertyValue, Result, TxId};
use terrane_durability::{snapshot_path, SnapshotWriter};
use terrane_storage::View;
use tracing::info;

pub(crate) fn create_snapshot(shared: &Shared, dir: &Path) -> Result<PathBuf> {
    let accessor = Accessor::new(shared);
    let tx = accessor.transaction();
    let snapshot_ids: Vec<TxId> = tx.snapshot().as_slice().to_vec();
    let indexes = accessor.index_info();

    let mut writer = SnapshotWriter::create(
        snapshot_path(dir, tx.id()),
        shared.vertex_gids.high_water(),
        shared.edge_gids.high_water(),
        tx.id(),
        &snapshot_ids,
        &indexes,
    )?;

    let mut vertices = 0u64;
    for entry in shared.vertices.iter() {
        let gid = *entry.key();
        if let Some(node) = entry
            .value()
            .find_visible(&shared.engine, tx, View::Current)
            .visible()
        {
            let labels: Vec<String> = node
                .record
                .labels
                .iter()
                .map(|id| shared.labels.name(*id))
                .collect();
            let properties: Vec<(String, PropertyValue)> = node
                .record
                .properties
                .iter()
                .map(|(id, value)| (shared.properties.name(id), value.clone()))
                .collect();
            writer.write_vertex(gid, &labels, &properties)?;
            vertices += 1;
        }
    }

    let mut edges = 0u64;
    for entry in shared.edges.iter() {
        let gid = *entry.key();
        if let Some(node) = entry
            .value()
            .find_visible(&shared.engine, tx, View::Current)
            .visible()
        {
            let properties: Vec<(String, PropertyValue)> = node
                .record
                .properties
                .iter()
                .map(|(id, value)| (shared.properties.name(id), value.clone()))
                .collect();
            writer.write_edge(
                gid,
                node.record.from,
                node.record.to,
                &shared.edge_types.name(node.record.edge_type),
                &properties,
            )?;
            edges += 1;
        }
    }

    let path = writer.finish()?;
    accessor.commit()?;
    info!(path = %path.display(), vertices, edges, "snapshot created");
    Ok(path)
}
