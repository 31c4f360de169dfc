#![deny(missing_docs)]
#![doc = "Core value, environment, error and RNG types for the Venture inference engine."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, VentureError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{extend_environment, lookup_symbol, root_environment, EnvFrame, Environment, Value};

/// Identifier for a node within a trace's node arena.
///
/// A single namespace is shared by every node variant (constant, lookup,
/// request, output); arena index stability is what lets `Value::SPRef`
/// address a maker node without holding a live reference to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}
