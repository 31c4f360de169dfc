use proptest::prelude::*;
use venture_core::{NodeId, Value};
use venture_graph::NodeArena;

fn every_child_has_reverse_parent(arena: &NodeArena) -> bool {
    for node in arena.node_ids() {
        for child in arena.children_of(node).unwrap() {
            if !arena.parents_of(child).unwrap().contains(&node) {
                return false;
            }
        }
    }
    true
}

proptest! {
    #[test]
    fn chains_of_lookups_keep_parent_child_consistency(depth in 1usize..20) {
        let mut arena = NodeArena::new();
        let mut last = arena.add_constant_node(Value::Number(0.0));
        for _ in 0..depth {
            last = arena.add_lookup_node(last).unwrap();
        }
        prop_assert!(every_child_has_reverse_parent(&arena));
    }

    #[test]
    fn application_fan_out_keeps_parent_child_consistency(arity in 0usize..8) {
        let mut arena = NodeArena::new();
        let operator = arena.add_constant_node(Value::SPRef(NodeId::from_raw(0)));
        let operands: Vec<NodeId> = (0..arity)
            .map(|i| arena.add_constant_node(Value::Number(i as f64)))
            .collect();
        let (request, output) = arena.add_application_nodes(operator, &operands).unwrap();

        prop_assert!(every_child_has_reverse_parent(&arena));
        prop_assert!(arena.parents_of(output).unwrap().contains(&request));
        prop_assert_eq!(arena.parents_of(request).unwrap().len(), 1 + arity);
    }
}
