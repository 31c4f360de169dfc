//! The two-level scope → block → node index.

use std::collections::{BTreeMap, BTreeSet};

use venture_core::{NodeId, RngHandle, VentureError};

/// Tracks which application nodes carry which `(scope, block)` tags.
#[derive(Debug, Clone, Default)]
pub struct ScopeIndex {
    scopes: BTreeMap<String, BTreeMap<String, BTreeSet<NodeId>>>,
}

impl ScopeIndex {
    /// Creates an empty scope index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node` to `scope`/`block`.
    pub fn insert(&mut self, scope: &str, block: &str, node: NodeId) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .entry(block.to_string())
            .or_default()
            .insert(node);
    }

    /// Removes `node` from `scope`/`block`, pruning empty blocks/scopes.
    pub fn remove(&mut self, scope: &str, block: &str, node: NodeId) {
        if let Some(blocks) = self.scopes.get_mut(scope) {
            if let Some(nodes) = blocks.get_mut(block) {
                nodes.remove(&node);
                if nodes.is_empty() {
                    blocks.remove(block);
                }
            }
            if blocks.is_empty() {
                self.scopes.remove(scope);
            }
        }
    }

    /// Returns the block names present in `scope`.
    pub fn blocks_in(&self, scope: &str) -> Vec<&str> {
        self.scopes
            .get(scope)
            .map(|blocks| blocks.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the nodes tagged with `scope`/`block`.
    pub fn nodes_in(&self, scope: &str, block: &str) -> BTreeSet<NodeId> {
        self.scopes
            .get(scope)
            .and_then(|blocks| blocks.get(block))
            .cloned()
            .unwrap_or_default()
    }

    /// Samples a block uniformly at random within `scope`, returning its
    /// member nodes.
    pub fn sample_block(&self, scope: &str, rng: &mut RngHandle) -> Result<Vec<NodeId>, VentureError> {
        let blocks = self.scopes.get(scope).ok_or_else(|| {
            VentureError::inference("empty-scope", format!("scope has no blocks: {scope}"))
        })?;
        if blocks.is_empty() {
            return Err(VentureError::inference(
                "empty-scope",
                format!("scope has no blocks: {scope}"),
            ));
        }
        let index = rng.uniform_index(blocks.len());
        let (_, nodes) = blocks.iter().nth(index).expect("index within bounds");
        Ok(nodes.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn blocks_prune_when_emptied() {
        let mut index = ScopeIndex::new();
        index.insert("default", "a", node(1));
        index.remove("default", "a", node(1));
        assert!(index.blocks_in("default").is_empty());
    }

    #[test]
    fn sample_block_returns_members() {
        let mut index = ScopeIndex::new();
        index.insert("default", "a", node(1));
        index.insert("default", "a", node(2));
        let mut rng = RngHandle::from_seed(3);
        let members = index.sample_block("default", &mut rng).unwrap();
        assert_eq!(members.len(), 2);
    }
}
