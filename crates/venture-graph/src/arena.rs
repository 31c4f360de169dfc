use std::collections::BTreeSet;

use venture_core::{NodeId, Value, VentureError};

use crate::ids::{make_node, node_index};
use crate::node::Node;

#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    kind: Node,
    alive: bool,
    value: Option<Value>,
    children: BTreeSet<NodeId>,
}

impl NodeRecord {
    fn new(kind: Node) -> Self {
        Self {
            kind,
            alive: true,
            value: None,
            children: BTreeSet::new(),
        }
    }
}

/// The arena-of-records storage for a trace's node graph.
///
/// Node identifiers index a flat `Vec`; removal marks a slot dead rather
/// than compacting the arena, so existing `NodeId`s are never invalidated.
/// Structural parents come from each node's `Node` payload; children are
/// the reverse adjacency, kept in sync whenever a node is added or removed.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    records: Vec<NodeRecord>,
}

impl NodeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constant node carrying `value`.
    pub fn add_constant_node(&mut self, value: Value) -> NodeId {
        let id = self.push(Node::Constant);
        self.set_value(id, value).expect("node was just created");
        id
    }

    /// Adds a lookup node mirroring `source`.
    pub fn add_lookup_node(&mut self, source: NodeId) -> Result<NodeId, VentureError> {
        self.ensure_alive(source)?;
        let id = self.push(Node::Lookup { source });
        self.link_child(source, id)?;
        Ok(id)
    }

    /// Adds a request/output pair applying `operator` to `operands`,
    /// wiring operator and operands as parents of both halves and the
    /// request as a parent of the output.
    pub fn add_application_nodes(
        &mut self,
        operator: NodeId,
        operands: &[NodeId],
    ) -> Result<(NodeId, NodeId), VentureError> {
        self.ensure_alive(operator)?;
        for operand in operands {
            self.ensure_alive(*operand)?;
        }

        let request_id = self.push(Node::Request {
            operator,
            operands: operands.to_vec(),
        });
        self.link_child(operator, request_id)?;
        for operand in operands {
            self.link_child(*operand, request_id)?;
        }

        let output_id = self.push(Node::Output {
            operator,
            operands: operands.to_vec(),
            request: request_id,
            esr_parents: Vec::new(),
            scope_tags: BTreeSet::new(),
            is_observed: false,
            observed_value: None,
            is_random: false,
        });
        self.link_child(operator, output_id)?;
        for operand in operands {
            self.link_child(*operand, output_id)?;
        }
        self.link_child(request_id, output_id)?;

        Ok((request_id, output_id))
    }

    /// Wires `parent` in as an additional ESR parent of `output`.
    pub fn add_esr_parent(&mut self, output: NodeId, parent: NodeId) -> Result<(), VentureError> {
        self.ensure_alive(parent)?;
        match &mut self.record_mut(output)?.kind {
            Node::Output { esr_parents, .. } => esr_parents.push(parent),
            _ => return Err(not_an_output(output)),
        }
        self.link_child(parent, output)
    }

    /// Removes the most recently added ESR parent of `output`, if any.
    pub fn pop_esr_parent(&mut self, output: NodeId) -> Result<Option<NodeId>, VentureError> {
        let removed = match &mut self.record_mut(output)?.kind {
            Node::Output { esr_parents, .. } => esr_parents.pop(),
            _ => return Err(not_an_output(output)),
        };
        if let Some(parent) = removed {
            self.unlink_child(parent, output)?;
        }
        Ok(removed)
    }

    /// Marks whether `output` applies a random PSP.
    pub fn set_is_random(&mut self, output: NodeId, is_random: bool) -> Result<(), VentureError> {
        match &mut self.record_mut(output)?.kind {
            Node::Output { is_random: slot, .. } => {
                *slot = is_random;
                Ok(())
            }
            _ => Err(not_an_output(output)),
        }
    }

    /// Marks whether `output` is currently constrained by an observation.
    pub fn set_is_observed(&mut self, output: NodeId, is_observed: bool) -> Result<(), VentureError> {
        match &mut self.record_mut(output)?.kind {
            Node::Output { is_observed: slot, .. } => {
                *slot = is_observed;
                Ok(())
            }
            _ => Err(not_an_output(output)),
        }
    }

    /// Marks `output` as constrained to `value` by an observation; clears
    /// the observed value when `value` is `None`.
    pub fn set_observed_value(&mut self, output: NodeId, value: Option<Value>) -> Result<(), VentureError> {
        match &mut self.record_mut(output)?.kind {
            Node::Output {
                is_observed: observed_flag,
                observed_value,
                ..
            } => {
                *observed_flag = value.is_some();
                *observed_value = value;
                Ok(())
            }
            _ => Err(not_an_output(output)),
        }
    }

    /// Returns the observed value constraining `output`, if any.
    pub fn observed_value(&self, output: NodeId) -> Result<Option<&Value>, VentureError> {
        match &self.record(output)?.kind {
            Node::Output { observed_value, .. } => Ok(observed_value.as_ref()),
            _ => Err(not_an_output(output)),
        }
    }

    /// Adds a scope tag to `output`.
    pub fn add_scope_tag(&mut self, output: NodeId, tag: crate::node::ScopeTag) -> Result<(), VentureError> {
        match &mut self.record_mut(output)?.kind {
            Node::Output { scope_tags, .. } => {
                scope_tags.insert(tag);
                Ok(())
            }
            _ => Err(not_an_output(output)),
        }
    }

    /// Removes a node that has no children and no remaining structural
    /// parents wired into the arena. Unwires this node from each of its
    /// own parents' children sets as part of removal.
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), VentureError> {
        let record = self.record(node)?;
        if !record.children.is_empty() {
            return Err(node_error("node-not-isolated", "cannot remove node with live children")
                .with_context("node", node.as_raw())
                .with_context("children", record.children.len()));
        }
        let parents = record.kind.structural_parents();
        for parent in parents {
            self.unlink_child(parent, node)?;
        }
        self.record_mut(node)?.alive = false;
        Ok(())
    }

    /// Returns the structural parents of `node`.
    pub fn parents_of(&self, node: NodeId) -> Result<Vec<NodeId>, VentureError> {
        Ok(self.record(node)?.kind.structural_parents())
    }

    /// Returns the children of `node`, in ascending id order.
    pub fn children_of(&self, node: NodeId) -> Result<Vec<NodeId>, VentureError> {
        Ok(self.record(node)?.children.iter().copied().collect())
    }

    /// Returns a reference to the node payload.
    pub fn node(&self, node: NodeId) -> Result<&Node, VentureError> {
        Ok(&self.record(node)?.kind)
    }

    /// Returns the currently assigned value, if any.
    pub fn value(&self, node: NodeId) -> Result<Option<&Value>, VentureError> {
        Ok(self.record(node)?.value.as_ref())
    }

    /// Sets the node's value. Used by evaluation and regeneration; never
    /// mutates sufficient statistics (that lives in `venture-trace`'s
    /// SP-aux store).
    pub fn set_value(&mut self, node: NodeId, value: Value) -> Result<(), VentureError> {
        self.record_mut(node)?.value = Some(value);
        Ok(())
    }

    /// Clears the node's value, as done when detaching.
    pub fn clear_value(&mut self, node: NodeId) -> Result<Option<Value>, VentureError> {
        Ok(self.record_mut(node)?.value.take())
    }

    /// Returns all currently-alive node ids, in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.alive)
            .map(|(idx, _)| make_node(idx))
            .collect()
    }

    /// Returns the raw alive flags for each arena slot, in index order.
    pub(crate) fn alive_flags(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.alive).collect()
    }

    /// Returns a slot's payload regardless of its alive flag, for
    /// serialization, which must also preserve dead slots.
    pub(crate) fn raw_slot(&self, index: usize) -> (bool, &Node, Option<&Value>) {
        let record = &self.records[index];
        (record.alive, &record.kind, record.value.as_ref())
    }

    /// Rebuilds an arena directly from per-slot payloads, preserving ids.
    /// Children sets are recomputed from each slot's structural parents
    /// rather than replayed through the high-level construction ops,
    /// since a serialized `Request`/`Output` pair was already built
    /// together and must not be re-paired on restore.
    pub(crate) fn from_slots(slots: Vec<(bool, Node, Option<Value>)>) -> Self {
        let mut records: Vec<NodeRecord> = slots
            .into_iter()
            .map(|(alive, kind, value)| NodeRecord {
                kind,
                alive,
                value,
                children: BTreeSet::new(),
            })
            .collect();
        let edges: Vec<(NodeId, NodeId)> = records
            .iter()
            .enumerate()
            .flat_map(|(idx, record)| {
                let child = make_node(idx);
                record
                    .kind
                    .structural_parents()
                    .into_iter()
                    .map(move |parent| (parent, child))
            })
            .collect();
        for (parent, child) in edges {
            if let Some(record) = records.get_mut(node_index(parent)) {
                record.children.insert(child);
            }
        }
        Self { records }
    }

    fn push(&mut self, kind: Node) -> NodeId {
        let id = make_node(self.records.len());
        self.records.push(NodeRecord::new(kind));
        id
    }

    fn link_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), VentureError> {
        self.record_mut(parent)?.children.insert(child);
        Ok(())
    }

    fn unlink_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), VentureError> {
        if let Some(record) = self.records.get_mut(node_index(parent)) {
            record.children.remove(&child);
        }
        Ok(())
    }

    fn ensure_alive(&self, node: NodeId) -> Result<(), VentureError> {
        self.record(node).map(|_| ())
    }

    fn record(&self, node: NodeId) -> Result<&NodeRecord, VentureError> {
        self.records
            .get(node_index(node))
            .filter(|r| r.alive)
            .ok_or_else(|| {
                node_error("unknown-node", "node does not exist").with_context("node", node.as_raw())
            })
    }

    fn record_mut(&mut self, node: NodeId) -> Result<&mut NodeRecord, VentureError> {
        self.records
            .get_mut(node_index(node))
            .filter(|r| r.alive)
            .ok_or_else(|| {
                node_error("unknown-node", "node does not exist").with_context("node", node.as_raw())
            })
    }
}

fn node_error(code: impl Into<String>, message: impl Into<String>) -> VentureError {
    VentureError::graph(code, message)
}

fn not_an_output(node: NodeId) -> VentureError {
    node_error("not-an-output-node", "operation requires an output node")
        .with_context("node", node.as_raw())
}

trait ContextExt {
    fn with_context(self, key: impl Into<String>, value: impl ToString) -> VentureError;
}

impl ContextExt for VentureError {
    fn with_context(self, key: impl Into<String>, value: impl ToString) -> VentureError {
        match self {
            VentureError::Graph(info) => VentureError::Graph(info.with_context(key, value.to_string())),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_nodes_wire_parents_and_children() {
        let mut arena = NodeArena::new();
        let operator = arena.add_constant_node(Value::SPRef(NodeId::from_raw(0)));
        let operand = arena.add_constant_node(Value::Number(1.0));
        let (request, output) = arena.add_application_nodes(operator, &[operand]).unwrap();

        assert_eq!(
            arena.parents_of(output).unwrap(),
            vec![operator, operand, request]
        );
        assert!(arena.children_of(operator).unwrap().contains(&request));
        assert!(arena.children_of(operator).unwrap().contains(&output));
        assert!(arena.children_of(request).unwrap().contains(&output));
    }

    #[test]
    fn esr_parent_round_trips() {
        let mut arena = NodeArena::new();
        let operator = arena.add_constant_node(Value::SPRef(NodeId::from_raw(0)));
        let (_, output) = arena.add_application_nodes(operator, &[]).unwrap();
        let esr_source = arena.add_constant_node(Value::Number(2.0));

        arena.add_esr_parent(output, esr_source).unwrap();
        assert!(arena.parents_of(output).unwrap().contains(&esr_source));
        assert_eq!(arena.pop_esr_parent(output).unwrap(), Some(esr_source));
        assert!(!arena.parents_of(output).unwrap().contains(&esr_source));
    }

    #[test]
    fn remove_node_requires_no_children() {
        let mut arena = NodeArena::new();
        let source = arena.add_constant_node(Value::Number(1.0));
        let lookup = arena.add_lookup_node(source).unwrap();

        assert!(arena.remove_node(source).is_err());
        arena.remove_node(lookup).unwrap();
        arena.remove_node(source).unwrap();
        assert!(arena.node(source).is_err());
    }

    #[test]
    fn removing_node_unlinks_from_parent_children() {
        let mut arena = NodeArena::new();
        let source = arena.add_constant_node(Value::Number(1.0));
        let lookup = arena.add_lookup_node(source).unwrap();
        arena.remove_node(lookup).unwrap();
        assert!(arena.children_of(source).unwrap().is_empty());
    }
}
