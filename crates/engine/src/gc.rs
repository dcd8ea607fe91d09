//! Background garbage collection
//!
//! A single worker thread periodically recomputes the GC snapshot, prunes
//! version chains, drops dead version lists from the maps and cleans the
//! indexes. It only unlinks state no active transaction can reach, so it
//! never contends with live writers beyond the per-list head locks.
//!
//! Shutdown is cooperative: an atomic flag observed at bounded intervals,
//! with the join handle owned by the storage.

use crate::graph::Shared;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::trace;

const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

pub(crate) struct GcWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl GcWorker {
    pub(crate) fn spawn(shared: Arc<Shared>, interval: Duration) -> GcWorker {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("terrane-gc".to_string())
            .spawn(move || {
                let mut last_run = Instant::now();
                while !flag.load(Ordering::Acquire) {
                    std::thread::sleep(SHUTDOWN_POLL.min(interval));
                    if last_run.elapsed() >= interval {
                        run_once(&shared);
                        last_run = Instant::now();
                    }
                }
            })
            .expect("failed to spawn gc worker");
        GcWorker {
            stop,
            handle: Some(handle),
        }
    }

    pub(crate) fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// One collection cycle: prune chains, drop dead lists, clean indexes.
pub(crate) fn run_once(shared: &Shared) {
    use terrane_concurrency::TransactionEngine;

    let snapshot = shared.engine.global_gc_snapshot();
    let Some(watermark) = snapshot.min() else {
        return;
    };

    let mut dead_vertices = Vec::new();
    for entry in shared.vertices.iter() {
        if entry.value().gc(&shared.engine, watermark) {
            dead_vertices.push(*entry.key());
        }
    }
    for gid in &dead_vertices {
        shared.vertices.remove(gid);
    }

    let mut dead_edges = Vec::new();
    for entry in shared.edges.iter() {
        if entry.value().gc(&shared.engine, watermark) {
            dead_edges.push(*entry.key());
        }
    }
    for gid in &dead_edges {
        shared.edges.remove(gid);
    }

    // Index entries survive until no uncollected version backs them;
    // readers re-check visibility in the meantime
    shared.label_index.clean(|label, gid| match shared.vertices.get(&gid) {
        None => true,
        Some(list) => !list.any_version(|v| v.has_label(label)),
    });
    shared
        .lp_index
        .clean(|key, value, gid| match shared.vertices.get(&gid) {
            None => true,
            Some(list) => !list.any_version(|v| {
                v.has_label(key.label) && v.properties.get(key.property) == Some(value)
            }),
        });

    if !dead_vertices.is_empty() || !dead_edges.is_empty() {
        trace!(
            vertices = dead_vertices.len(),
            edges = dead_edges.len(),
            %watermark,
            "collected dead version lists"
        );
    }
}
