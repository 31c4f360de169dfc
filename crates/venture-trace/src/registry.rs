//! The global random-choice registry.

use std::collections::HashMap;

use venture_core::{NodeId, RngHandle, VentureError};

/// A dense, O(1)-sample, O(1)-remove registry of nodes currently carrying
/// an incorporated, unconstrained draw from a random PSP.
///
/// Backed by a `Vec` for uniform sampling plus a `HashMap` index so
/// removal can swap-remove instead of scanning, matching the "stable
/// node-indexed dense representation" note on the random-choice registry.
#[derive(Debug, Clone, Default)]
pub struct RandomChoiceRegistry {
    nodes: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
}

impl RandomChoiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node`. Idempotent.
    pub fn insert(&mut self, node: NodeId) {
        if self.index.contains_key(&node) {
            return;
        }
        self.index.insert(node, self.nodes.len());
        self.nodes.push(node);
    }

    /// Unregisters `node`. Idempotent.
    pub fn remove(&mut self, node: NodeId) {
        let Some(pos) = self.index.remove(&node) else {
            return;
        };
        let last = self.nodes.len() - 1;
        self.nodes.swap(pos, last);
        self.nodes.pop();
        if pos < self.nodes.len() {
            let moved = self.nodes[pos];
            self.index.insert(moved, pos);
        }
    }

    /// Returns whether `node` is currently registered.
    pub fn contains(&self, node: NodeId) -> bool {
        self.index.contains_key(&node)
    }

    /// Returns the number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Samples a node uniformly at random.
    pub fn sample_uniform(&self, rng: &mut RngHandle) -> Result<NodeId, VentureError> {
        if self.nodes.is_empty() {
            return Err(VentureError::inference(
                "empty-registry",
                "cannot sample a principal node from an empty random-choice registry",
            ));
        }
        Ok(self.nodes[rng.uniform_index(self.nodes.len())])
    }

    /// Iterates the registered nodes in registry order (not a stable
    /// traversal order across mutations).
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn insert_and_remove_keep_dense_packing() {
        let mut registry = RandomChoiceRegistry::new();
        registry.insert(node(1));
        registry.insert(node(2));
        registry.insert(node(3));
        registry.remove(node(1));

        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(node(1)));
        assert!(registry.contains(node(2)));
        assert!(registry.contains(node(3)));
    }

    #[test]
    fn sampling_empty_registry_errors() {
        let registry = RandomChoiceRegistry::new();
        let mut rng = RngHandle::from_seed(0);
        assert!(registry.sample_uniform(&mut rng).is_err());
    }
}
