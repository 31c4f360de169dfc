#![deny(missing_docs)]
//! Trace storage: the node arena, SP-aux store, random-choice registry,
//! and scope index that together record every random choice made while
//! executing a probabilistic program.

mod registry;
mod scope;
mod trace;

pub use registry::RandomChoiceRegistry;
pub use scope::ScopeIndex;
pub use trace::Trace;
