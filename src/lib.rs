//! # TerraneDB
//!
//! A transactional MVCC storage core for a labeled property graph:
//! per-record version chains with snapshot visibility, a transaction engine
//! with commit log and GC snapshots, label and label-property indexes kept
//! consistent with visibility, and a WAL + snapshot durability pipeline.
//!
//! # Quick Start
//!
//! ```no_run
//! use terranedb::{Config, GraphStorage, PropertyValue, View};
//!
//! fn main() -> terranedb::Result<()> {
//!     let storage = GraphStorage::open(Config::new("./graph-data"))?;
//!
//!     let accessor = storage.access();
//!     let alice = accessor.insert_vertex(None)?;
//!     accessor.add_label(alice.gid(), "Person")?;
//!     accessor.set_property(alice.gid(), "name", PropertyValue::from("Alice"))?;
//!     accessor.commit()?;
//!
//!     let reader = storage.access();
//!     for person in reader.vertices_with_label("Person", View::Current) {
//!         println!("{} -> {:?}", person.gid(), person.property("name"));
//!     }
//!     reader.commit()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! [`GraphStorage`] is the entry point; every read and write goes through an
//! [`Accessor`] bound to one transaction. Internal crates (core, storage,
//! concurrency, durability, engine) carry the machinery; this facade
//! re-exports the stable surface.

pub use terrane_core::{
    CmdId, Gid, PropertyValue, Result, StorageError, TxId, ValueError,
};
pub use terrane_engine::{
    Accessor, Config, EdgeView, GraphStorage, RecoveryInfo, RecoveryStatus, VertexView, View,
};
