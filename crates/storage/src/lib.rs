//! Storage structures for the Terrane graph core
//!
//! Owns the MVCC data structures: vertex and edge records, per-entity
//! version lists with the visibility predicate, the lock-free name↔id
//! registries, gid generators, and the label / label-property indexes.
//!
//! The maps from `Gid` to version list are owned by the engine crate's
//! `GraphStorage`; everything here is the machinery those maps point at.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod generator;
pub mod index;
pub mod record;
pub mod registry;
pub mod version_list;

pub use generator::GidGenerator;
pub use index::{IndexContainer, LabelIndex, LabelPropertyIndex, LabelPropertyKey};
pub use record::{Edge, EdgeRef, PropertyMap, Vertex};
pub use registry::{NameIdRegistry, RegistryId};
pub use version_list::{Lookup, VersionList, VersionNode, View};
