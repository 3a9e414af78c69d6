//! Branch lineage for ChainScript.
//!
//! Rebuilds the story forest from a registry snapshot: which story each
//! branch descends from, how deep it sits, and which parent links had to be
//! cut to keep the result acyclic. The forest is derived data and is
//! recomputed on every query.

pub mod lineage;
pub mod node;
pub mod resolver;

pub use lineage::Lineage;
pub use node::{EdgeSource, LineageCycleWarning, LineageEdge, LineageNode};
pub use resolver::{resolve_lineage, LineageResolver};
