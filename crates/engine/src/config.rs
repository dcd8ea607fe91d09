//! Engine configuration
//!
//! Constructed once at startup and threaded explicitly through the engine;
//! there is no global configuration state. Settings of the outer system
//! (query plan cache, Raft ids and ports) do not reach this core.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration of a `GraphStorage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the durability files (`wal/` and `snapshots/`).
    pub durability_dir: PathBuf,

    /// This worker's id, packed into the high bits of every generated gid.
    pub worker_id: u16,

    /// Whether WAL and snapshot files are written and recovered at all.
    pub durability_enabled: bool,

    /// Size threshold at which the active WAL segment is sealed.
    pub wal_segment_size: u64,

    /// Interval between garbage collection runs, in milliseconds.
    pub gc_interval_ms: u64,

    /// Write a final snapshot when the storage shuts down.
    pub snapshot_on_shutdown: bool,
}

impl Config {
    /// Defaults with the given durability directory.
    pub fn new(durability_dir: impl Into<PathBuf>) -> Config {
        Config {
            durability_dir: durability_dir.into(),
            worker_id: 0,
            durability_enabled: true,
            wal_segment_size: 16 * 1024 * 1024,
            gc_interval_ms: 30_000,
            snapshot_on_shutdown: false,
        }
    }

    /// In-memory configuration: no durability files at all.
    pub fn in_memory() -> Config {
        let mut config = Config::new("");
        config.durability_enabled = false;
        config
    }

    /// Set the worker id.
    pub fn with_worker_id(mut self, worker_id: u16) -> Config {
        self.worker_id = worker_id;
        self
    }

    /// Set the WAL segment size threshold.
    pub fn with_wal_segment_size(mut self, bytes: u64) -> Config {
        self.wal_segment_size = bytes;
        self
    }

    /// Set the GC interval.
    pub fn with_gc_interval(mut self, interval: Duration) -> Config {
        self.gc_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enable or disable the shutdown snapshot.
    pub fn with_snapshot_on_shutdown(mut self, enabled: bool) -> Config {
        self.snapshot_on_shutdown = enabled;
        self
    }

    /// The GC interval as a `Duration`.
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    /// Directory of WAL segments.
    pub fn wal_dir(&self) -> PathBuf {
        self.durability_dir.join("wal")
    }

    /// Directory of snapshot files.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.durability_dir.join("snapshots")
    }

    /// The durability root.
    pub fn durability_dir(&self) -> &Path {
        &self.durability_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("/tmp/terrane");
        assert!(config.durability_enabled);
        assert_eq!(config.worker_id, 0);
        assert_eq!(config.wal_dir(), PathBuf::from("/tmp/terrane/wal"));
        assert_eq!(config.snapshot_dir(), PathBuf::from("/tmp/terrane/snapshots"));
    }

    #[test]
    fn test_builders() {
        let config = Config::new("/tmp/terrane")
            .with_worker_id(3)
            .with_wal_segment_size(1024)
            .with_gc_interval(Duration::from_millis(50))
            .with_snapshot_on_shutdown(true);
        assert_eq!(config.worker_id, 3);
        assert_eq!(config.wal_segment_size, 1024);
        assert_eq!(config.gc_interval(), Duration::from_millis(50));
        assert!(config.snapshot_on_shutdown);
    }

    #[test]
    fn test_in_memory() {
        let config = Config::in_memory();
        assert!(!config.durability_enabled);
    }
}
