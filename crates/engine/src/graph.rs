//! `GraphStorage`: ownership and wiring
//!
//! Owns the gid → version-list maps, the name registries, the gid
//! generators, both indexes, the transaction engine, the WAL handle and the
//! background garbage collector. Opening a storage recovers durable state
//! before the WAL is attached, so replay never re-logs itself.

use crate::accessor::Accessor;
use crate::config::Config;
use crate::gc::GcWorker;
use crate::recovery::{self, RecoveryInfo};
use crate::snapshot_ops;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use terrane_concurrency::SingleNodeEngine;
use terrane_core::{EdgeTypeId, Gid, LabelId, PropertyId, Result, TxId};
use terrane_durability::WalWriter;
use terrane_storage::{
    Edge, GidGenerator, LabelIndex, LabelPropertyIndex, NameIdRegistry, Vertex, VersionList,
};
use tracing::{error, info};

/// Everything accessors and background workers share.
pub(crate) struct Shared {
    pub(crate) engine: SingleNodeEngine,
    pub(crate) vertices: DashMap<Gid, Arc<VersionList<Vertex>>>,
    pub(crate) edges: DashMap<Gid, Arc<VersionList<Edge>>>,
    pub(crate) labels: NameIdRegistry<LabelId>,
    pub(crate) edge_types: NameIdRegistry<EdgeTypeId>,
    pub(crate) properties: NameIdRegistry<PropertyId>,
    pub(crate) vertex_gids: GidGenerator,
    pub(crate) edge_gids: GidGenerator,
    pub(crate) label_index: LabelIndex,
    pub(crate) lp_index: LabelPropertyIndex,
    pub(crate) wal: RwLock<Option<Arc<Mutex<WalWriter>>>>,
    pub(crate) counters: DashMap<String, AtomicI64>,
    /// Transactions currently building an index; other builds skip waiting
    /// for them so concurrent builds cannot deadlock each other.
    pub(crate) index_builders: DashSet<TxId>,
}

impl Shared {
    fn new(worker_id: u16) -> Shared {
        Shared {
            engine: SingleNodeEngine::new(),
            vertices: DashMap::new(),
            edges: DashMap::new(),
            labels: NameIdRegistry::new(),
            edge_types: NameIdRegistry::new(),
            properties: NameIdRegistry::new(),
            vertex_gids: GidGenerator::new(worker_id),
            edge_gids: GidGenerator::new(worker_id),
            label_index: LabelIndex::new(),
            lp_index: LabelPropertyIndex::new(),
            wal: RwLock::new(None),
            counters: DashMap::new(),
            index_builders: DashSet::new(),
        }
    }
}

/// A single-worker graph storage instance.
pub struct GraphStorage {
    shared: Arc<Shared>,
    config: Config,
    recovery: RecoveryInfo,
    gc: Option<GcWorker>,
}

impl GraphStorage {
    /// Open the storage: create directories, recover durable state, attach
    /// the WAL and start background workers.
    pub fn open(config: Config) -> Result<GraphStorage> {
        let shared = Arc::new(Shared::new(config.worker_id));

        let recovery_info = if config.durability_enabled {
            fs::create_dir_all(config.wal_dir())?;
            fs::create_dir_all(config.snapshot_dir())?;

            let info = recovery::recover(&shared, &config)?;
            info!(
                status = ?info.status,
                snapshot = ?info.snapshot,
                deltas_applied = info.deltas_applied,
                deltas_skipped = info.deltas_skipped,
                wal_files = info.wal_files,
                "recovery complete"
            );

            let wal = Arc::new(Mutex::new(WalWriter::open(
                config.wal_dir(),
                config.wal_segment_size,
            )?));
            *shared.wal.write() = Some(Arc::clone(&wal));
            shared.engine.set_wal(wal);
            info
        } else {
            RecoveryInfo::skipped()
        };

        let gc = GcWorker::spawn(Arc::clone(&shared), config.gc_interval());

        Ok(GraphStorage {
            shared,
            config,
            recovery: recovery_info,
            gc: Some(gc),
        })
    }

    /// Begin a transaction and return its accessor.
    pub fn access(&self) -> Accessor<'_> {
        Accessor::new(&self.shared)
    }

    /// What recovery found when this storage was opened.
    pub fn recovery_info(&self) -> &RecoveryInfo {
        &self.recovery
    }

    /// The configuration this storage was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Atomic fetch-add on the named counter; returns the previous value.
    pub fn counter(&self, name: &str, step: i64) -> i64 {
        self.shared
            .counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(step, Ordering::SeqCst)
    }

    /// Number of vertex version lists currently stored (all visibilities).
    pub fn stored_vertex_count(&self) -> usize {
        self.shared.vertices.len()
    }

    /// Number of edge version lists currently stored (all visibilities).
    pub fn stored_edge_count(&self) -> usize {
        self.shared.edges.len()
    }

    /// Write a snapshot of the currently committed graph.
    pub fn create_snapshot(&self) -> Result<PathBuf> {
        if !self.config.durability_enabled {
            return Err(terrane_core::StorageError::durability(
                "durability is disabled",
            ));
        }
        snapshot_ops::create_snapshot(&self.shared, &self.config.snapshot_dir())
    }

    /// Run one garbage collection cycle synchronously.
    pub fn collect_garbage(&self) {
        crate::gc::run_once(&self.shared);
    }
}

impl Drop for GraphStorage {
    fn drop(&mut self) {
        if let Some(gc) = self.gc.take() {
            gc.stop();
        }
        if self.config.durability_enabled && self.config.snapshot_on_shutdown {
            if let Err(e) = snapshot_ops::create_snapshot(&self.shared, &self.config.snapshot_dir())
            {
                error!(error = %e, "shutdown snapshot failed");
            }
        }
        if let Some(wal) = self.shared.wal.read().as_ref() {
            if let Err(e) = wal.lock().seal() {
                error!(error = %e, "failed to seal wal on shutdown");
            }
        }
    }
}
