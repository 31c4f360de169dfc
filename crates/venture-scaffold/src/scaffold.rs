//! Classifies the nodes reachable from a set of principal nodes into the
//! resampling/absorbing/AAA/brush partition a DRG-based kernel needs.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use venture_core::{NodeId, VentureError};
use venture_graph::Node;
use venture_trace::Trace;

/// The scaffold computed for one proposal: the directed resampling graph
/// (`resampling`/`absorbing`/`aaa`) plus the brush set of families that
/// exist only because of a request this proposal may change.
#[derive(Debug, Clone, Default)]
pub struct Scaffold {
    resampling: BTreeMap<NodeId, usize>,
    absorbing: BTreeSet<NodeId>,
    aaa: BTreeSet<NodeId>,
    brush: BTreeSet<NodeId>,
    border: Vec<Vec<NodeId>>,
    variational: BTreeSet<NodeId>,
}

impl Scaffold {
    /// Resampling nodes and their regen count: how many times the
    /// upward detach/regen walk will reach each one before it is
    /// actually processed.
    pub fn resampling(&self) -> &BTreeMap<NodeId, usize> {
        &self.resampling
    }

    /// Nodes whose current value is kept and rescored rather than redrawn.
    pub fn absorbing(&self) -> &BTreeSet<NodeId> {
        &self.absorbing
    }

    /// Maker nodes resampled via their declared AAA kernel instead of
    /// individually resampling every node built on their made-SP.
    pub fn aaa(&self) -> &BTreeSet<NodeId> {
        &self.aaa
    }

    /// Families that exist only because of a request this scaffold may
    /// change, and so are detached and discarded unconditionally.
    pub fn brush(&self) -> &BTreeSet<NodeId> {
        &self.brush
    }

    /// The scaffold's downstream frontier: the members with no scaffold
    /// child, where `detach_and_extract` starts and `regen_and_attach`
    /// ends. One `Vec` per ordered block; a single block for the
    /// unordered (single-scaffold) case this crate builds today.
    pub fn border(&self) -> &[Vec<NodeId>] {
        &self.border
    }

    /// Returns whether `node` is in the resampling set.
    pub fn is_resampling(&self, node: NodeId) -> bool {
        self.resampling.contains_key(&node)
    }

    /// Returns whether `node` is in the resampling, absorbing, or AAA set.
    pub fn contains(&self, node: NodeId) -> bool {
        self.resampling.contains_key(&node) || self.absorbing.contains(&node) || self.aaa.contains(&node)
    }

    /// Returns `node`'s regen count, 0 if it is not a resampling node.
    pub fn regen_count(&self, node: NodeId) -> usize {
        self.resampling.get(&node).copied().unwrap_or(0)
    }

    /// Marks `node` as brush: created by a request this proposal issued,
    /// so a same-proposal detach (on rejection) must tear it down rather
    /// than treat it as a permanent part of the trace. Used by `eval_family`
    /// as it creates nodes while evaluating a freshly-requested family.
    pub fn mark_brush(&mut self, node: NodeId) {
        self.brush.insert(node);
    }

    /// Marks `node` for variational treatment: `apply_psp` will use its
    /// PSP's advertised variational kernel instead of simulating from the
    /// prior, and will record a gradient. Used by the mean-field operator.
    pub fn mark_variational(&mut self, node: NodeId) {
        self.variational.insert(node);
    }

    /// Returns whether `node` was marked for variational treatment.
    pub fn is_variational(&self, node: NodeId) -> bool {
        self.variational.contains(&node)
    }

    /// Decrements `node`'s regen count (a no-op if it is not resampling),
    /// returning the count after decrementing. Used by `detach_and_extract`
    /// as it walks up the scaffold: a node is detached once its count
    /// reaches zero.
    pub fn decrement_regen_count(&mut self, node: NodeId) -> usize {
        match self.resampling.get_mut(&node) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        }
    }

    /// Increments `node`'s regen count (a no-op if it is not resampling),
    /// returning the count before incrementing. Used by `regen_and_attach`:
    /// a node is (re)applied only the first time it is reached, when the
    /// count is still zero.
    pub fn increment_regen_count(&mut self, node: NodeId) -> usize {
        match self.resampling.get_mut(&node) {
            Some(count) => {
                let before = *count;
                *count += 1;
                before
            }
            None => 0,
        }
    }
}

/// Builds a scaffold from one or more ordered blocks of principal nodes.
///
/// Each principal must be a random output node. The downstream closure
/// walks children from the principals: non-application nodes and
/// deterministic applications always resample (there is nothing to
/// rescore); random applications are classified absorbing and the walk
/// stops there, unless the node is a maker whose applied maker-PSP
/// declares an AAA kernel, in which case it is classified `aaa` and the
/// walk continues past it. A second fixpoint pass then reclassifies as
/// brush any node whose requesting request node, or whose operator, is
/// already in the scaffold or brush.
pub fn construct_scaffold(
    trace: &Trace,
    principal_node_sets: &[Vec<NodeId>],
) -> Result<Scaffold, VentureError> {
    for block in principal_node_sets {
        for &node in block {
            match trace.arena().node(node)? {
                Node::Output { is_random: true, .. } => {}
                _ => {
                    return Err(VentureError::inference(
                        "not-a-principal-node",
                        format!("node {} is not a random output node", node.as_raw()),
                    ))
                }
            }
        }
    }

    let mut resampling: BTreeSet<NodeId> = BTreeSet::new();
    for block in principal_node_sets {
        resampling.extend(block.iter().copied());
    }

    let mut absorbing: BTreeSet<NodeId> = BTreeSet::new();
    let mut aaa: BTreeSet<NodeId> = BTreeSet::new();
    let mut visited: BTreeSet<NodeId> = resampling.clone();
    let mut queue: VecDeque<NodeId> = resampling.iter().copied().collect();

    while let Some(node) = queue.pop_front() {
        for child in trace.arena().children_of(node)? {
            if visited.contains(&child) {
                continue;
            }
            visited.insert(child);

            match trace.arena().node(child)? {
                Node::Constant | Node::Lookup { .. } | Node::Request { .. } => {
                    resampling.insert(child);
                    queue.push_back(child);
                }
                Node::Output { is_random, .. } => {
                    if !*is_random {
                        resampling.insert(child);
                        queue.push_back(child);
                        continue;
                    }
                    if trace.made_sp(child).is_some() {
                        if let Ok(sp) = trace.sp_applied_at(child) {
                            if sp.output_psp.aaa_kernel().is_some() {
                                aaa.insert(child);
                                queue.push_back(child);
                                continue;
                            }
                        }
                    }
                    // Absorbing nodes anchor the DRG: keep the value, stop.
                    absorbing.insert(child);
                }
            }
        }
    }

    let brush = compute_brush(trace, &resampling, &absorbing, &aaa)?;
    resampling.retain(|node| !brush.contains(node));
    absorbing.retain(|node| !brush.contains(node));
    aaa.retain(|node| !brush.contains(node));

    let scaffold_members: BTreeSet<NodeId> = resampling
        .iter()
        .chain(absorbing.iter())
        .chain(aaa.iter())
        .copied()
        .collect();

    // The border is the scaffold's downstream frontier: members with no
    // child also in the scaffold. Detach starts here (the farthest
    // consumers are unincorporated first) and regen ends here. Every
    // absorbing node is necessarily a sink too: the walk above never
    // expands past one, so nothing downstream of it ever joined the
    // scaffold.
    let mut sinks: Vec<NodeId> = Vec::new();
    for &node in &scaffold_members {
        let children = trace.arena().children_of(node)?;
        if !children.iter().any(|child| scaffold_members.contains(child)) {
            sinks.push(node);
        }
    }
    sinks.sort();

    // A node's regen count is how many times the upward walk will reach
    // it: once for each scaffold member whose own structural-parent list
    // names it (with multiplicity, since an application can reference the
    // same parent twice), plus once more if it is itself a border sink,
    // the walk's own starting point. AAA nodes are counted alongside
    // ordinary resampling nodes since both gate on this same count;
    // absorbing nodes need none (every absorbing node is a sink, visited
    // directly by the border loop exactly once) but still contribute to
    // their own parents' counts since `attach`/`unattach` walk upward too.
    let mut resampling_counts: BTreeMap<NodeId, usize> = BTreeMap::new();
    for node in resampling.iter().chain(aaa.iter()) {
        resampling_counts.insert(*node, 0);
    }
    for node in resampling.iter().chain(aaa.iter()).chain(absorbing.iter()) {
        for parent in trace.arena().parents_of(*node)? {
            if let Some(count) = resampling_counts.get_mut(&parent) {
                *count += 1;
            }
        }
    }
    for &sink in &sinks {
        if let Some(count) = resampling_counts.get_mut(&sink) {
            *count += 1;
        }
    }

    Ok(Scaffold {
        resampling: resampling_counts,
        absorbing,
        aaa,
        brush,
        border: vec![sinks],
    })
}

fn compute_brush(
    trace: &Trace,
    resampling: &BTreeSet<NodeId>,
    absorbing: &BTreeSet<NodeId>,
    aaa: &BTreeSet<NodeId>,
) -> Result<BTreeSet<NodeId>, VentureError> {
    let mut requester: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    for id in trace.arena().node_ids() {
        if let Node::Output { request, esr_parents, .. } = trace.arena().node(id)? {
            for esr_root in esr_parents {
                requester.insert(*esr_root, *request);
            }
        }
    }

    let mut brush: BTreeSet<NodeId> = BTreeSet::new();
    let in_scaffold_or_brush = |brush: &BTreeSet<NodeId>, node: NodeId| {
        resampling.contains(&node) || absorbing.contains(&node) || aaa.contains(&node) || brush.contains(&node)
    };

    let mut changed = true;
    while changed {
        changed = false;
        for id in trace.arena().node_ids() {
            if brush.contains(&id) {
                continue;
            }
            let requester_hit = requester
                .get(&id)
                .map(|requester_node| in_scaffold_or_brush(&brush, *requester_node))
                .unwrap_or(false);
            let operator_hit = match trace.arena().node(id)? {
                Node::Request { operator, .. } | Node::Output { operator, .. } => {
                    in_scaffold_or_brush(&brush, *operator)
                }
                _ => false,
            };
            if requester_hit || operator_hit {
                brush.insert(id);
                changed = true;
            }
        }
    }

    Ok(brush)
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::{RngHandle, Value};
    use venture_sp::{NullRequestPSP, OutputPSP, SPAux, UnitAux, SP};

    #[derive(Debug)]
    struct ConstPsp;

    impl OutputPSP for ConstPsp {
        fn simulate(
            &self,
            _operands: &[Value],
            _aux: Option<&dyn SPAux>,
            _rng: &mut RngHandle,
        ) -> Result<Value, VentureError> {
            Ok(Value::Number(1.0))
        }

        fn log_density(
            &self,
            _value: &Value,
            _operands: &[Value],
            _aux: Option<&dyn SPAux>,
        ) -> Result<f64, VentureError> {
            Ok(0.0)
        }

        fn incorporate(&self, _v: &Value, _o: &[Value], _a: &mut dyn SPAux) -> Result<(), VentureError> {
            Ok(())
        }

        fn unincorporate(&self, _v: &Value, _o: &[Value], _a: &mut dyn SPAux) -> Result<(), VentureError> {
            Ok(())
        }

        fn is_random(&self) -> bool {
            true
        }
    }

    fn install_maker(trace: &mut Trace) -> NodeId {
        let maker = trace.create_constant_node(Value::Nil);
        let sp = SP::new(Box::new(NullRequestPSP), Box::new(ConstPsp), || Box::new(UnitAux) as Box<dyn SPAux>);
        trace.install_made_sp(maker, sp, Box::new(UnitAux));
        maker
    }

    #[test]
    fn rejects_non_random_principal() {
        let mut trace = Trace::new();
        let operator = install_maker(&mut trace);
        let (_, output) = trace.create_application_nodes(operator, &[]).unwrap();
        assert!(construct_scaffold(&trace, &[vec![output]]).is_err());
    }

    #[test]
    fn single_principal_has_no_downstream_members() {
        let mut trace = Trace::new();
        let operator = install_maker(&mut trace);
        let (_, output) = trace.create_application_nodes(operator, &[]).unwrap();
        trace.arena_mut().set_is_random(output, true).unwrap();
        trace.arena_mut().set_value(output, Value::Number(1.0)).unwrap();

        let scaffold = construct_scaffold(&trace, &[vec![output]]).unwrap();
        assert!(scaffold.is_resampling(output));
        // The principal is also the scaffold's only border sink, so the
        // upward walk reaches it once via the sink bonus even though it
        // has no scaffold children of its own.
        assert_eq!(scaffold.regen_count(output), 1);
        assert!(scaffold.absorbing().is_empty());
        assert!(scaffold.brush().is_empty());
    }

    #[test]
    fn downstream_random_application_absorbs_and_stops() {
        let mut trace = Trace::new();
        let operator = install_maker(&mut trace);
        let (_, principal) = trace.create_application_nodes(operator, &[]).unwrap();
        trace.arena_mut().set_is_random(principal, true).unwrap();
        trace.arena_mut().set_value(principal, Value::Number(1.0)).unwrap();

        let downstream_operator = install_maker(&mut trace);
        let (_, downstream) = trace
            .create_application_nodes(downstream_operator, &[principal])
            .unwrap();
        trace.arena_mut().set_is_random(downstream, true).unwrap();
        trace.arena_mut().set_value(downstream, Value::Number(1.0)).unwrap();

        let scaffold = construct_scaffold(&trace, &[vec![principal]]).unwrap();
        assert!(scaffold.absorbing().contains(&downstream));
        assert!(!scaffold.is_resampling(downstream));
    }
}
