//! The Terrane graph storage engine
//!
//! Wires the storage structures, the transaction engine and the durability
//! pipeline into one `GraphStorage`. Every interaction with the graph goes
//! through an `Accessor` bound to a single transaction.
//!
//! ```no_run
//! use terrane_engine::{Config, GraphStorage, View};
//! use terrane_core::PropertyValue;
//!
//! fn main() -> terrane_core::Result<()> {
//!     let storage = GraphStorage::open(Config::new("./graph-data"))?;
//!
//!     let accessor = storage.access();
//!     let vertex = accessor.insert_vertex(None)?;
//!     accessor.add_label(vertex.gid(), "Person")?;
//!     accessor.set_property(vertex.gid(), "age", PropertyValue::Int(30))?;
//!     accessor.commit()?;
//!
//!     let reader = storage.access();
//!     let found = reader.find_vertex(vertex.gid(), View::Current)?.unwrap();
//!     assert!(found.has_label("Person"));
//!     reader.commit()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod config;
mod gc;
pub mod graph;
pub mod recovery;
mod snapshot_ops;

pub use accessor::{Accessor, EdgeView, VertexView};
pub use config::Config;
pub use graph::GraphStorage;
pub use recovery::{RecoveryInfo, RecoveryStatus};
pub use terrane_storage::View;
