use serde::{Deserialize, Serialize};

use venture_core::{Value, VentureError};

use crate::arena::NodeArena;
use crate::node::Node;

/// Serializes the arena to a compact binary representation using `bincode`.
pub fn arena_to_bytes(arena: &NodeArena) -> Result<Vec<u8>, VentureError> {
    let payload = SerializableArena::from_arena(arena);
    bincode::serialize(&payload)
        .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("serialize-bytes", err.to_string())))
}

/// Restores an arena from its binary representation.
pub fn arena_from_bytes(bytes: &[u8]) -> Result<NodeArena, VentureError> {
    let payload: SerializableArena = bincode::deserialize(bytes)
        .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("deserialize-bytes", err.to_string())))?;
    Ok(payload.into_arena())
}

/// Serializes the arena to a JSON string.
pub fn arena_to_json(arena: &NodeArena) -> Result<String, VentureError> {
    let payload = SerializableArena::from_arena(arena);
    serde_json::to_string_pretty(&payload)
        .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("serialize-json", err.to_string())))
}

/// Restores an arena from a JSON string.
pub fn arena_from_json(json: &str) -> Result<NodeArena, VentureError> {
    let payload: SerializableArena = serde_json::from_str(json)
        .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("deserialize-json", err.to_string())))?;
    Ok(payload.into_arena())
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializableArena {
    slots: Vec<SerializableSlot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializableSlot {
    alive: bool,
    kind: Node,
    value: Option<Value>,
}

impl SerializableArena {
    fn from_arena(arena: &NodeArena) -> Self {
        let alive = arena.alive_flags();
        let slots = alive
            .into_iter()
            .enumerate()
            .map(|(idx, _)| {
                let (alive, kind, value) = arena.raw_slot(idx);
                SerializableSlot {
                    alive,
                    kind: kind.clone(),
                    value: value.cloned(),
                }
            })
            .collect();
        Self { slots }
    }

    fn into_arena(self) -> NodeArena {
        let triples = self
            .slots
            .into_iter()
            .map(|slot| (slot.alive, slot.kind, slot.value))
            .collect();
        NodeArena::from_slots(triples)
    }
}
