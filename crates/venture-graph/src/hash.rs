use sha2::{Digest, Sha256};

use venture_core::{NodeId, Value, VentureError};

use crate::arena::NodeArena;
use crate::node::Node;

/// Computes a canonical structural hash of the arena, used as the
/// `trace_hash` stamped into run provenance. Sensitive to arena layout:
/// two arenas built via different sequences of operations that happen to
/// reach the same logical graph are not guaranteed to hash equal. The
/// round-trip property regen/detach rely on is layout preservation, not
/// layout invariance, so this is sufficient.
pub fn canonical_hash(arena: &NodeArena) -> Result<String, VentureError> {
    let mut hasher = Sha256::new();
    let ids = arena.node_ids();
    hasher.update((ids.len() as u64).to_le_bytes());
    for id in ids {
        encode_node(id, arena.node(id)?, arena.value(id)?, &mut hasher);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn encode_node(id: NodeId, node: &Node, value: Option<&Value>, hasher: &mut Sha256) {
    hasher.update(id.as_raw().to_le_bytes());
    match node {
        Node::Constant => hasher.update(b"constant"),
        Node::Lookup { source } => {
            hasher.update(b"lookup");
            hasher.update(source.as_raw().to_le_bytes());
        }
        Node::Request { operator, operands } => {
            hasher.update(b"request");
            encode_ids(operator, operands, hasher);
        }
        Node::Output {
            operator,
            operands,
            request,
            esr_parents,
            is_observed,
            is_random,
            ..
        } => {
            hasher.update(b"output");
            encode_ids(operator, operands, hasher);
            hasher.update(request.as_raw().to_le_bytes());
            hasher.update((esr_parents.len() as u64).to_le_bytes());
            for parent in esr_parents {
                hasher.update(parent.as_raw().to_le_bytes());
            }
            hasher.update([*is_observed as u8, *is_random as u8]);
        }
    }
    encode_value(value, hasher);
}

fn encode_ids(operator: &NodeId, operands: &[NodeId], hasher: &mut Sha256) {
    hasher.update(operator.as_raw().to_le_bytes());
    hasher.update((operands.len() as u64).to_le_bytes());
    for operand in operands {
        hasher.update(operand.as_raw().to_le_bytes());
    }
}

fn encode_value(value: Option<&Value>, hasher: &mut Sha256) {
    match value {
        None => hasher.update(b"novalue"),
        Some(value) => hasher.update(format!("{value}").as_bytes()),
    }
}
