//! Startup recovery
//!
//! Rebuilds a fresh engine from durable state:
//!
//! 1. The newest snapshot that validates (magic, version, content hash) is
//!    replayed in a single transaction; invalid snapshots are skipped in
//!    favor of older ones.
//! 2. WAL files are replayed in filename order. A delta applies iff its
//!    transaction either began after the snapshotting transaction or was
//!    active when the snapshot was taken; everything else is already in the
//!    snapshot. Each recovered transaction gets its own long-lived
//!    accessor, so the replayed interleaving reproduces the original
//!    visibility.
//! 3. `BuildIndex` deltas are queued and executed after all WAL replay,
//!    under a final accessor.
//!
//! Torn WAL tails end a file's replay without failing recovery; the result
//! carries a tri-state status instead of a single bool.

use crate::accessor::Accessor;
use crate::config::Config;
use crate::graph::Shared;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use terrane_core::{Result, StorageError, TxId};
use terrane_durability::{
    list_snapshot_files, list_wal_files, read_snapshot, SnapshotContents, StateDelta, WalReader,
};
use terrane_storage::{LabelPropertyKey, View};
use tracing::{info, warn};

/// Overall outcome of a recovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStatus {
    /// Every durable file replayed to its end.
    Complete,
    /// A WAL tail was torn; the recovered state is a committed prefix.
    Partial,
    /// Snapshots existed but none validated; state was rebuilt from the
    /// WAL alone.
    Failed,
}

/// What recovery found and did.
#[derive(Debug, Clone)]
pub struct RecoveryInfo {
    /// Overall outcome.
    pub status: RecoveryStatus,
    /// The snapshot file that was replayed, if any.
    pub snapshot: Option<PathBuf>,
    /// Deltas applied from the WAL.
    pub deltas_applied: u64,
    /// Deltas skipped as already covered by the snapshot.
    pub deltas_skipped: u64,
    /// WAL files visited.
    pub wal_files: u64,
}

impl RecoveryInfo {
    pub(crate) fn skipped() -> RecoveryInfo {
        RecoveryInfo {
            status: RecoveryStatus::Complete,
            snapshot: None,
            deltas_applied: 0,
            deltas_skipped: 0,
            wal_files: 0,
        }
    }
}

pub(crate) fn recover(shared: &Shared, config: &Config) -> Result<RecoveryInfo> {
    let mut info = RecoveryInfo::skipped();

    // Newest snapshot that validates wins; the rest are left alone
    let snapshot_files = list_snapshot_files(&config.snapshot_dir())?;
    let snapshots_present = !snapshot_files.is_empty();
    let mut snapshot_tx = TxId::NONE;
    let mut snapshot_set: Vec<TxId> = Vec::new();
    for path in snapshot_files {
        match read_snapshot(&path) {
            Ok(contents) => {
                snapshot_tx = contents.snapshotter_tx;
                snapshot_set = contents.snapshotter_snapshot.clone();
                replay_snapshot(shared, &contents)?;
                info!(
                    path = %path.display(),
                    vertices = contents.vertices.len(),
                    edges = contents.edges.len(),
                    "snapshot recovered"
                );
                info.snapshot = Some(path);
                break;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot rejected, trying older one");
            }
        }
    }

    // WAL replay with one live accessor per recovered transaction
    let mut clean = true;
    let mut accessors: FxHashMap<u64, Accessor<'_>> = FxHashMap::default();
    let mut pending_indexes: Vec<(String, String)> = Vec::new();

    for path in list_wal_files(&config.wal_dir())? {
        let mut reader = match WalReader::open(&path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable wal file");
                clean = false;
                continue;
            }
        };
        info.wal_files += 1;

        while let Some(delta) = Iterator::next(&mut reader) {
            let tx = delta.tx_id();
            // Anything at or before the snapshotting transaction is already
            // in the snapshot, unless it was still active at snapshot time
            if tx <= snapshot_tx && !snapshot_set.contains(&tx) {
                info.deltas_skipped += 1;
                continue;
            }
            info.deltas_applied += 1;

            match delta {
                StateDelta::TxBegin { tx } => {
                    if accessors.insert(tx.raw(), Accessor::new(shared)).is_some() {
                        warn!(%tx, "duplicate begin in wal");
                    }
                }
                StateDelta::TxCommit { tx } => match accessors.remove(&tx.raw()) {
                    Some(accessor) => accessor.commit()?,
                    None => warn!(%tx, "commit without begin in wal"),
                },
                StateDelta::TxAbort { tx } => match accessors.remove(&tx.raw()) {
                    Some(accessor) => accessor.abort()?,
                    None => warn!(%tx, "abort without begin in wal"),
                },
                StateDelta::BuildIndex {
                    label, property, ..
                } => {
                    pending_indexes.push((label, property));
                }
                data => {
                    let accessor = accessors.get(&tx.raw()).ok_or_else(|| {
                        StorageError::fatal(format!("wal delta for unknown transaction {tx}"))
                    })?;
                    if let Err(e) = apply_data_delta(accessor, &data) {
                        warn!(%tx, error = %e, ?data, "skipping unreplayable delta");
                    }
                }
            }
        }
        if !reader.ended_cleanly() {
            clean = false;
        }
    }

    // Transactions without a terminal delta died in the crash
    for (_, accessor) in accessors.drain() {
        accessor.abort()?;
    }

    // Index builds run after all data is back
    if !pending_indexes.is_empty() {
        let accessor = Accessor::new(shared);
        for (label, property) in pending_indexes {
            build_recovered_index(shared, &accessor, &label, &property);
        }
        accessor.commit()?;
    }

    info.status = if snapshots_present && info.snapshot.is_none() {
        RecoveryStatus::Failed
    } else if !clean {
        RecoveryStatus::Partial
    } else {
        RecoveryStatus::Complete
    };
    Ok(info)
}

/// Replay a validated snapshot in one transaction.
fn replay_snapshot(shared: &Shared, contents: &SnapshotContents) -> Result<()> {
    shared.vertex_gids.restore(contents.vertex_generator_high);
    shared.edge_gids.restore(contents.edge_generator_high);

    // Indexes recorded in the snapshot exist before any record is replayed,
    // so the replay writes populate them on their normal write path
    for (label, property) in &contents.indexes {
        let key = LabelPropertyKey {
            label: shared.labels.get_or_create(label),
            property: shared.properties.get_or_create(property),
        };
        if let Some(container) = shared.lp_index.create(key) {
            container.mark_ready();
        }
    }

    let accessor = Accessor::new(shared);
    for vertex in &contents.vertices {
        accessor.insert_vertex(Some(vertex.gid))?;
        for label in &vertex.labels {
            accessor.add_label(vertex.gid, label)?;
        }
        for (property, value) in &vertex.properties {
            accessor.set_property(vertex.gid, property, value.clone())?;
        }
    }
    for edge in &contents.edges {
        accessor.insert_edge(edge.from, edge.to, &edge.edge_type, Some(edge.gid))?;
        for (property, value) in &edge.properties {
            accessor.set_edge_property(edge.gid, property, value.clone())?;
        }
    }
    accessor.commit()
}

fn apply_data_delta(accessor: &Accessor<'_>, delta: &StateDelta) -> Result<()> {
    match delta {
        StateDelta::CreateVertex { gid, .. } => accessor.insert_vertex(Some(*gid)).map(|_| ()),
        StateDelta::RemoveVertex { gid, .. } => match accessor.remove_vertex(*gid)? {
            true => Ok(()),
            false => Err(StorageError::transaction(
                "removed vertex still has edges during replay",
            )),
        },
        StateDelta::CreateEdge {
            gid,
            from,
            to,
            edge_type,
            ..
        } => accessor
            .insert_edge(*from, *to, edge_type, Some(*gid))
            .map(|_| ()),
        StateDelta::RemoveEdge { gid, .. } => accessor.remove_edge(*gid),
        StateDelta::SetVertexProperty {
            gid,
            property,
            value,
            ..
        } => accessor.set_property(*gid, property, value.clone()),
        StateDelta::SetEdgeProperty {
            gid,
            property,
            value,
            ..
        } => accessor.set_edge_property(*gid, property, value.clone()),
        StateDelta::AddLabel { gid, label, .. } => accessor.add_label(*gid, label),
        StateDelta::RemoveLabel { gid, label, .. } => accessor.remove_label(*gid, label),
        StateDelta::TxBegin { .. }
        | StateDelta::TxCommit { .. }
        | StateDelta::TxAbort { .. }
        | StateDelta::BuildIndex { .. } => unreachable!("handled by the replay loop"),
    }
}

/// Create and populate one index recovered from a `BuildIndex` delta.
fn build_recovered_index(shared: &Shared, accessor: &Accessor<'_>, label: &str, property: &str) {
    let key = LabelPropertyKey {
        label: shared.labels.get_or_create(label),
        property: shared.properties.get_or_create(property),
    };
    // Already present when the snapshot recorded it too
    let Some(container) = shared.lp_index.create(key) else {
        return;
    };
    for entry in shared.vertices.iter() {
        if let Some(node) = entry
            .value()
            .find_visible(&shared.engine, accessor.transaction(), View::Current)
            .visible()
        {
            if node.record.has_label(key.label) {
                if let Some(value) = node.record.properties.get(key.property) {
                    container.add(value.clone(), *entry.key());
                }
            }
        }
    }
    container.mark_ready();
    info!(label, property, "index rebuilt from wal");
}
