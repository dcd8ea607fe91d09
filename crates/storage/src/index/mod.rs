//! Label and label-property indexes
//!
//! Indexes are updated on the write path with the new current version and
//! never block readers or writers. Entries may be stale (the backing
//! version collected, the label removed again): readers always re-resolve
//! the gid through the version-list map and re-check visibility, and the
//! index cleaner prunes entries whose backing versions are gone.

mod label;
mod label_property;

pub use label::LabelIndex;
pub use label_property::{IndexContainer, LabelPropertyIndex, LabelPropertyKey};
