//! Detaches a scaffold's resampling nodes, undoing what `regen_and_attach`
//! would redo, and snapshots everything removed into an [`OmegaDB`] so a
//! rejected proposal can restore it exactly.

use std::collections::VecDeque;

use venture_core::{NodeId, Value, VentureError};
use venture_graph::Node;
use venture_scaffold::{OmegaDB, Scaffold};
use venture_trace::Trace;

/// One step of the explicit work-list `detach` drives in place of native
/// recursion: `Enter` gates on the regen count and queues an AAA tail
/// hook ahead of the node's own teardown; `Process` unapplies the node
/// and then queues its structural parents.
enum Frame {
    Enter(NodeId),
    Process(NodeId),
}

/// Walks a scaffold's border inward, detaching or unattaching each member,
/// and returns the accumulated reverse log-weight together with the
/// snapshot needed to put everything back.
///
/// The weight returned here is the denominator half of a Metropolis-
/// Hastings acceptance ratio: `regen_and_attach`'s forward weight minus
/// this weight is the log acceptance ratio's core term, before any
/// proposal-kernel correction.
pub fn detach_and_extract(trace: &mut Trace, scaffold: &mut Scaffold) -> Result<(f64, OmegaDB), VentureError> {
    let mut omega_db = OmegaDB::new();
    let mut weight = 0.0;
    let border = scaffold.border().to_vec();

    for block in border.iter().rev() {
        for &node in block.iter().rev() {
            if scaffold.absorbing().contains(&node) {
                weight += unattach(trace, node, scaffold, &mut omega_db)?;
            } else {
                weight += detach(trace, node, scaffold, &mut omega_db)?;
            }
        }
    }

    Ok((weight, omega_db))
}

/// Detaches `node` and, transitively, whichever of its structural parents
/// have had every downstream resampling member detached this cycle.
///
/// A no-op for nodes outside the scaffold: their value belongs to state
/// this proposal does not touch.
///
/// Driven by an explicit work-list rather than self-recursion, for the
/// same reason `regen` is: the structural-parent chain walked here can
/// be as deep as the program being traced.
pub(crate) fn detach(
    trace: &mut Trace,
    start: NodeId,
    scaffold: &mut Scaffold,
    omega_db: &mut OmegaDB,
) -> Result<f64, VentureError> {
    let mut weight = 0.0;
    let mut work: VecDeque<Frame> = VecDeque::new();
    work.push_back(Frame::Enter(start));

    while let Some(frame) = work.pop_back() {
        match frame {
            Frame::Enter(node) => {
                if !(scaffold.is_resampling(node) && scaffold.decrement_regen_count(node) == 0) {
                    continue;
                }

                work.push_back(Frame::Process(node));

                // Mirrors `regen`'s tail hook: a node whose value
                // references an AAA maker must pull that maker's detach
                // in too, wherever it was reached from, since its
                // made-SP is about to be replaced. Queued on top of
                // `Process(node)` so it finishes first, matching the
                // original pre-teardown ordering.
                if let Some(Value::SPRef(referenced_maker)) = trace.arena().value(node)?.cloned() {
                    if referenced_maker != node && scaffold.aaa().contains(&referenced_maker) {
                        work.push_back(Frame::Enter(referenced_maker));
                    }
                }
            }
            Frame::Process(node) => {
                if scaffold.aaa().contains(&node) {
                    // The aux must stay live for the kernel to condition the
                    // replacement draw on; nothing to unincorporate or clear here.
                } else {
                    match trace.arena().node(node)?.clone() {
                        Node::Constant => {}
                        Node::Lookup { .. } => {
                            trace.arena_mut().clear_value(node)?;
                        }
                        Node::Request { .. } => {
                            // Its ESR structure is only ever torn down by a live
                            // re-application (`eval_requests`'s stale-key cleanup),
                            // never by a plain detach of an otherwise-unchanged
                            // scaffold.
                        }
                        Node::Output { .. } => {
                            weight += unapply_output(trace, node, scaffold, omega_db)?;
                        }
                    }
                }

                for parent in trace.arena().parents_of(node)?.into_iter().rev() {
                    work.push_back(Frame::Enter(parent));
                }
            }
        }
    }

    Ok(weight)
}

/// Detaches every structural parent of `node`, in order.
fn detach_parents(
    trace: &mut Trace,
    node: NodeId,
    scaffold: &mut Scaffold,
    omega_db: &mut OmegaDB,
) -> Result<f64, VentureError> {
    let mut weight = 0.0;
    for parent in trace.arena().parents_of(node)? {
        weight += detach(trace, parent, scaffold, omega_db)?;
    }
    Ok(weight)
}

/// Rescoring-only detach for an absorbing node: its value is kept, only
/// its contribution to the maker's aux and its own density are removed,
/// under whatever operand values are still live before its parents are
/// walked.
pub(crate) fn unattach(
    trace: &mut Trace,
    node: NodeId,
    scaffold: &mut Scaffold,
    omega_db: &mut OmegaDB,
) -> Result<f64, VentureError> {
    let value = trace
        .arena()
        .value(node)?
        .cloned()
        .ok_or_else(|| VentureError::graph("no-value", "absorbing node has no value"))?;
    let operands = trace.operand_values(node)?;
    let maker = trace.maker_of(node)?;

    let density = {
        let sp = trace
            .made_sp(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.log_density(&value, &operands, trace.sp_aux(maker))?
    };

    {
        let (sp, aux) = trace
            .sp_and_aux_mut(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.unincorporate(&value, &operands, aux)?;
    }

    Ok(density + detach_parents(trace, node, scaffold, omega_db)?)
}

/// Removes an output node's contribution: installs-a-maker nodes are
/// snapshotted and uninstalled whole; ordinary nodes are unincorporated,
/// their value snapshotted, and (if random) unregistered.
fn unapply_output(
    trace: &mut Trace,
    node: NodeId,
    scaffold: &mut Scaffold,
    omega_db: &mut OmegaDB,
) -> Result<f64, VentureError> {
    let operands = trace.operand_values(node)?;
    let maker = trace.maker_of(node)?;
    let (is_maker, is_esr_ref) = trace
        .made_sp(maker)
        .map(|sp| (sp.output_psp.is_maker(), sp.output_psp.is_esr_ref()))
        .unwrap_or((false, false));

    if is_esr_ref {
        // Nothing was incorporated when this node's value was forwarded
        // from its ESR parent; just clear it, no density or aux change.
        trace.arena_mut().clear_value(node)?;
        return Ok(0.0);
    }

    if is_maker {
        let (sp, aux) = trace
            .uninstall_made_sp(node)
            .ok_or_else(|| VentureError::graph("no-made-sp", "output node has no made SP to detach"))?;
        omega_db.record_made_sp(node, sp, aux);
        trace.arena_mut().clear_value(node)?;
        return Ok(0.0);
    }

    let value = trace
        .arena()
        .value(node)?
        .cloned()
        .ok_or_else(|| VentureError::graph("no-value", "output node has no value to detach"))?;

    let mut weight = 0.0;
    if scaffold.is_variational(node) {
        let sp = trace
            .made_sp(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        let kernel = sp.output_psp.variational_kernel().ok_or_else(|| {
            VentureError::inference(
                "no-variational-kernel",
                "node was marked variational but its PSP advertises no variational kernel",
            )
        })?;
        let prior_density = sp.output_psp.log_density(&value, &operands, trace.sp_aux(maker))?;
        weight += prior_density - kernel.log_density(&value);
    }

    {
        let (sp, aux) = trace
            .sp_and_aux_mut(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.unincorporate(&value, &operands, aux)?;
    }

    let is_random = trace.arena().node(node)?.is_random_output();
    omega_db.record_value(node, value);
    trace.arena_mut().clear_value(node)?;
    if is_random {
        trace.unregister_random(node);
    }

    Ok(weight)
}

/// Structurally removes a brush family that a live re-application no
/// longer references (an `if` switching branches, say), recursing into
/// whichever structural parents become childless as a result.
///
/// Returns the log-density unincorporated while tearing the family down,
/// so the caller can back it out of its own running weight. Relies on
/// `NodeArena::remove_node`'s refusal to remove a node with live
/// children: a family shared with anything still alive elsewhere simply
/// stops the cascade there instead of silently corrupting shared state.
pub(crate) fn detach_family_rooted_at(
    trace: &mut Trace,
    root: NodeId,
    scaffold: &mut Scaffold,
    omega_db: &mut OmegaDB,
) -> Result<f64, VentureError> {
    let mut weight = 0.0;

    if let Node::Output { request, esr_parents, .. } = trace.arena().node(root)?.clone() {
        weight += unapply_output(trace, root, scaffold, omega_db)?;
        for esr_parent in esr_parents {
            if let Some((key, _)) = trace
                .families_for(request)
                .into_iter()
                .find(|(_, parent)| *parent == esr_parent)
            {
                trace.unregister_family(request, &key);
                omega_db.record_esr_parent(request, key, esr_parent);
            }
            remove_esr_parent(trace, root, esr_parent)?;
            weight += detach_family_rooted_at(trace, esr_parent, scaffold, omega_db)?;
        }
    }

    let structural_parents = trace.arena().parents_of(root)?;
    trace.arena_mut().remove_node(root)?;

    for parent in structural_parents {
        if trace.arena().children_of(parent)?.is_empty() {
            weight += detach_family_rooted_at(trace, parent, scaffold, omega_db)?;
        }
    }

    Ok(weight)
}

/// Unwires `target` from `output`'s ESR-parent list without disturbing
/// the relative order of the ones that remain. `NodeArena` only exposes
/// LIFO push/pop on this list, so removing one from the middle means
/// draining it and pushing the survivors back.
pub(crate) fn remove_esr_parent(trace: &mut Trace, output: NodeId, target: NodeId) -> Result<(), VentureError> {
    let mut popped = Vec::new();
    while let Some(parent) = trace.arena_mut().pop_esr_parent(output)? {
        popped.push(parent);
    }
    popped.retain(|&parent| parent != target);
    for parent in popped.into_iter().rev() {
        trace.arena_mut().add_esr_parent(output, parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::{root_environment, Environment, RngHandle};
    use venture_sp::{NullRequestPSP, OutputPSP, SPAux, UnitAux, SP};

    #[derive(Debug)]
    struct ConstPsp(f64);

    impl OutputPSP for ConstPsp {
        fn simulate(&self, _o: &[Value], _a: Option<&dyn SPAux>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
            Ok(Value::Number(self.0))
        }
        fn log_density(&self, _v: &Value, _o: &[Value], _a: Option<&dyn SPAux>) -> Result<f64, VentureError> {
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

    fn install_maker(trace: &mut Trace, value: f64) -> NodeId {
        let maker = trace.create_constant_node(Value::Nil);
        let sp = SP::new(
            Box::new(NullRequestPSP),
            Box::new(ConstPsp(value)),
            || Box::new(UnitAux) as Box<dyn SPAux>,
        );
        trace.install_made_sp(maker, sp, Box::new(UnitAux));
        maker
    }

    fn apply_node(trace: &mut Trace, operator: NodeId, env: &Environment) -> NodeId {
        let (request, output) = trace.create_application_nodes(operator, &[]).unwrap();
        trace.set_request_environment(request, env.clone());
        output
    }

    #[test]
    fn detach_clears_the_value_of_a_resampling_output() {
        let mut trace = Trace::new();
        let env = root_environment();
        let operator = install_maker(&mut trace, 9.0);
        let output = apply_node(&mut trace, operator, &env);
        trace.arena_mut().set_is_random(output, true).unwrap();
        trace.arena_mut().set_value(output, Value::Number(9.0)).unwrap();

        let mut scaffold = venture_scaffold::construct_scaffold(&trace, &[vec![output]]).unwrap();
        let (weight, omega_db) = detach_and_extract(&mut trace, &mut scaffold).unwrap();

        assert_eq!(weight, 0.0);
        assert!(trace.arena().value(output).unwrap().is_none());
        assert_eq!(omega_db.is_empty(), false);
    }
}
