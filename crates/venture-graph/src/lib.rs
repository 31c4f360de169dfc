#![deny(missing_docs)]
//! Node arena and graph storage for a Venture trace.
//!
//! The arena models the four node variants of the trace's dependency
//! graph (constant, lookup, request, output) as an append-only `Vec` of
//! records, in the same style as an ASM-lineage hypergraph: node
//! identifiers are stable arena indices, removal only flips an alive
//! flag, and children are a reverse-adjacency index kept in sync with
//! each node's declared structural parents.

mod arena;
mod hash;
mod ids;
mod node;
mod serialization;

pub use arena::NodeArena;
pub use hash::canonical_hash;
pub use node::{Node, ScopeTag};
pub use serialization::{arena_from_bytes, arena_from_json, arena_to_bytes, arena_to_json};
