//! The detach-time snapshot store: values, made-SPs, and latent state
//! pulled off the trace so `regen_and_attach` can restore them exactly.

use std::collections::HashMap;
use std::fmt;

use venture_core::{NodeId, Value};
use venture_sp::{SPAux, SP};

/// Key identifying one exposed-simulation-request slot within a maker's
/// latent state.
pub type EsrKey = String;

/// Opaque per-SP latent state, snapshotted and restored across detach and
/// regen without `OmegaDB` needing to know its shape.
///
/// No built-in procedure currently has latents; the trait exists so a
/// future maker can participate in detach/regen without changing
/// `OmegaDB`'s shape.
pub trait LatentDB: fmt::Debug {}

/// Snapshot of everything `detach_and_extract` pulled off a trace: node
/// values, made-SPs (with their aux), and per-maker latent databases.
#[derive(Debug, Default)]
pub struct OmegaDB {
    values: HashMap<NodeId, Value>,
    made_sps: HashMap<NodeId, (SP, Box<dyn SPAux>)>,
    latent_dbs: HashMap<(NodeId, EsrKey), Box<dyn LatentDB>>,
    esr_parents: HashMap<(NodeId, EsrKey), NodeId>,
}

impl OmegaDB {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the value a node held before being detached.
    pub fn record_value(&mut self, node: NodeId, value: Value) {
        self.values.insert(node, value);
    }

    /// Removes and returns the recorded value for `node`, if any.
    pub fn take_value(&mut self, node: NodeId) -> Option<Value> {
        self.values.remove(&node)
    }

    /// Returns whether a value was recorded for `node`.
    pub fn has_value(&self, node: NodeId) -> bool {
        self.values.contains_key(&node)
    }

    /// Records the made-SP and aux a maker node held before being detached.
    pub fn record_made_sp(&mut self, maker: NodeId, sp: SP, aux: Box<dyn SPAux>) {
        self.made_sps.insert(maker, (sp, aux));
    }

    /// Removes and returns the recorded made-SP and aux for `maker`, if any.
    pub fn take_made_sp(&mut self, maker: NodeId) -> Option<(SP, Box<dyn SPAux>)> {
        self.made_sps.remove(&maker)
    }

    /// Returns whether a made-SP was recorded for `maker`.
    pub fn has_made_sp(&self, maker: NodeId) -> bool {
        self.made_sps.contains_key(&maker)
    }

    /// Records a maker's latent state for one ESR key.
    pub fn record_latent_db(&mut self, maker: NodeId, key: impl Into<EsrKey>, db: Box<dyn LatentDB>) {
        self.latent_dbs.insert((maker, key.into()), db);
    }

    /// Removes and returns a maker's latent state for one ESR key, if any.
    pub fn take_latent_db(&mut self, maker: NodeId, key: &str) -> Option<Box<dyn LatentDB>> {
        self.latent_dbs.remove(&(maker, key.to_string()))
    }

    /// Records the family root detached for a requester's ESR key, so a
    /// rejected proposal's regen can restore the exact same sub-family
    /// instead of re-evaluating the request's expression.
    pub fn record_esr_parent(&mut self, maker: NodeId, key: impl Into<EsrKey>, esr_parent: NodeId) {
        self.esr_parents.insert((maker, key.into()), esr_parent);
    }

    /// Removes and returns the recorded family root for a requester's ESR
    /// key, if any.
    pub fn take_esr_parent(&mut self, maker: NodeId, key: &str) -> Option<NodeId> {
        self.esr_parents.remove(&(maker, key.to_string()))
    }

    /// Returns whether the snapshot holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.made_sps.is_empty()
            && self.latent_dbs.is_empty()
            && self.esr_parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trips_through_record_and_take() {
        let mut db = OmegaDB::new();
        let node = NodeId::from_raw(0);
        assert!(!db.has_value(node));
        db.record_value(node, Value::Number(3.0));
        assert!(db.has_value(node));
        assert_eq!(db.take_value(node), Some(Value::Number(3.0)));
        assert_eq!(db.take_value(node), None);
    }

    #[test]
    fn empty_snapshot_reports_empty() {
        let db = OmegaDB::new();
        assert!(db.is_empty());
    }
}
