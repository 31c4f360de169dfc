use venture_core::{NodeId, Value};
use venture_graph::{arena_from_bytes, arena_from_json, arena_to_bytes, arena_to_json, canonical_hash, NodeArena};

fn sample_arena() -> NodeArena {
    let mut arena = NodeArena::new();
    let operator = arena.add_constant_node(Value::SPRef(NodeId::from_raw(0)));
    let operand = arena.add_constant_node(Value::Number(2.0));
    let (_, output) = arena.add_application_nodes(operator, &[operand]).unwrap();
    arena.set_value(output, Value::Number(4.0)).unwrap();
    arena
}

#[test]
fn json_round_trip_preserves_structure_and_hash() {
    let arena = sample_arena();
    let before = canonical_hash(&arena).unwrap();

    let json = arena_to_json(&arena).unwrap();
    let restored = arena_from_json(&json).unwrap();

    assert_eq!(canonical_hash(&restored).unwrap(), before);
}

#[test]
fn bincode_round_trip_preserves_structure_and_hash() {
    let arena = sample_arena();
    let before = canonical_hash(&arena).unwrap();

    let bytes = arena_to_bytes(&arena).unwrap();
    let restored = arena_from_bytes(&bytes).unwrap();

    assert_eq!(canonical_hash(&restored).unwrap(), before);
}

#[test]
fn round_trip_preserves_dead_slots() {
    let mut arena = NodeArena::new();
    let source = arena.add_constant_node(Value::Number(1.0));
    let lookup = arena.add_lookup_node(source).unwrap();
    arena.remove_node(lookup).unwrap();

    let json = arena_to_json(&arena).unwrap();
    let restored = arena_from_json(&json).unwrap();

    assert!(restored.node(lookup).is_err());
    assert!(restored.node(source).is_ok());
}
