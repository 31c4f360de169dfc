//! Regenerates a scaffold's resampling nodes in dependency order, walking
//! from a detached border back up to wherever the proposal's principal
//! nodes sit.

use std::collections::VecDeque;

use venture_core::{NodeId, RngHandle, Value, VentureError};
use venture_graph::Node;
use venture_scaffold::{OmegaDB, Scaffold};
use venture_trace::Trace;

use crate::apply::apply;
use crate::constrain::reconstrain;
use crate::gradients::Gradients;

/// One step of the explicit work-list `regen` drives in place of native
/// recursion: `Enter` walks a node's structural parents before `Process`
/// runs its own output-PSP application, and `TailHook` follows up on a
/// value that references an AAA maker needing its own regen.
enum Frame {
    Enter(NodeId),
    Process(NodeId),
    TailHook(NodeId),
}

/// Regenerates `node` and, transitively, whichever of its structural
/// parents have not yet been regenerated this cycle.
///
/// A no-op for nodes outside the scaffold: their current value is
/// already correct. AAA maker nodes are resampled from their declared
/// conditional kernel instead of running the ordinary output-PSP path.
///
/// Driven by an explicit work-list rather than self-recursion: the
/// structural-parent chain this walks can be as deep as the program
/// being traced, and a `VecDeque` on the heap has no stack-depth limit
/// to overflow.
#[allow(clippy::too_many_arguments)]
pub fn regen(
    trace: &mut Trace,
    start: NodeId,
    scaffold: &mut Scaffold,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    let mut weight = 0.0;
    let mut work: VecDeque<Frame> = VecDeque::new();
    work.push_back(Frame::Enter(start));

    while let Some(frame) = work.pop_back() {
        match frame {
            Frame::Enter(node) => {
                // The tail hook always runs for this invocation, whether
                // or not the node itself gets (re)processed below.
                work.push_back(Frame::TailHook(node));

                if scaffold.is_resampling(node) && scaffold.increment_regen_count(node) == 0 {
                    work.push_back(Frame::Process(node));
                    for parent in trace.arena().parents_of(node)?.into_iter().rev() {
                        work.push_back(Frame::Enter(parent));
                    }
                }
            }
            Frame::Process(node) => {
                if scaffold.aaa().contains(&node) {
                    weight += resample_aaa(trace, node, should_restore, omega_db, rng)?;
                } else {
                    match trace.arena().node(node)?.clone() {
                        Node::Constant => {}
                        Node::Lookup { source } => {
                            let value = trace
                                .arena()
                                .value(source)?
                                .cloned()
                                .ok_or_else(|| VentureError::graph("no-value", "lookup source has no value"))?;
                            trace.arena_mut().set_value(node, value)?;
                        }
                        Node::Request { .. } => {
                            // Scored and applied together with its sibling output.
                        }
                        Node::Output { request, .. } => {
                            weight += apply(trace, request, node, scaffold, should_restore, omega_db, gradients, rng)?;
                        }
                    }
                }
            }
            Frame::TailHook(node) => {
                // A node whose value references a maker that is itself
                // AAA must pull that maker's resample in too, however it
                // was reached: every downstream consumer of the made-SP
                // needs the freshly conditioned one, not just the nodes
                // directly built on top of the maker node.
                if let Ok(Some(Value::SPRef(referenced_maker))) = trace.arena().value(node).map(|v| v.cloned()) {
                    if referenced_maker != node && scaffold.aaa().contains(&referenced_maker) {
                        work.push_back(Frame::Enter(referenced_maker));
                    }
                }
            }
        }
    }

    Ok(weight)
}

/// Regenerates every structural parent of `node`, in order.
#[allow(clippy::too_many_arguments)]
fn regen_parents(
    trace: &mut Trace,
    node: NodeId,
    scaffold: &mut Scaffold,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    let mut weight = 0.0;
    for parent in trace.arena().parents_of(node)? {
        weight += regen(trace, parent, scaffold, should_restore, omega_db, gradients, rng)?;
    }
    Ok(weight)
}

/// Rescoring-only regen for an absorbing node: its value is kept, not
/// redrawn, but its parents must still be regenerated first and its
/// contribution reincorporated under their (possibly new) values.
#[allow(clippy::too_many_arguments)]
pub fn attach(
    trace: &mut Trace,
    node: NodeId,
    scaffold: &mut Scaffold,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    let mut weight = regen_parents(trace, node, scaffold, should_restore, omega_db, gradients, rng)?;

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
    weight += density;

    {
        let (sp, aux) = trace
            .sp_and_aux_mut(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.incorporate(&value, &operands, aux)?;
    }

    Ok(weight)
}

/// Draws (or restores) a fresh made-SP from an AAA maker's declared
/// kernel, conditioned on the aux accumulated by every application of
/// the made-SP it replaces. Its weight contribution is always zero: the
/// kernel samples exactly the posterior conditional.
fn resample_aaa(
    trace: &mut Trace,
    node: NodeId,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    if should_restore {
        let (sp, aux) = omega_db
            .take_made_sp(node)
            .ok_or_else(|| VentureError::inference("missing-restore-made-sp", "no made SP recorded to restore"))?;
        trace.install_made_sp(node, sp, aux);
        trace.arena_mut().set_value(node, Value::SPRef(node))?;
        return Ok(0.0);
    }

    let operands = trace.operand_values(node)?;
    let applied = trace.sp_applied_at(node)?;
    let kernel = applied.output_psp.aaa_kernel().ok_or_else(|| {
        VentureError::inference("no-aaa-kernel", "node was classified AAA but its PSP advertises no AAA kernel")
    })?;
    let aux = trace
        .sp_aux(node)
        .ok_or_else(|| VentureError::graph("no-made-sp", "AAA node has no aux to condition its kernel on"))?;
    let record = kernel.simulate(&operands, aux, rng)?;

    let (old_sp, old_aux) = trace
        .uninstall_made_sp(node)
        .ok_or_else(|| VentureError::graph("no-made-sp", "AAA node has no made SP to replace"))?;
    omega_db.record_made_sp(node, old_sp, old_aux);
    trace.install_made_sp(node, record.sp, record.aux);
    trace.arena_mut().set_value(node, Value::SPRef(node))?;
    Ok(0.0)
}

/// Detaches `border`'s nodes and regenerates the scaffold in place,
/// returning the Metropolis-Hastings weight for the whole move: the sum
/// of `regen_and_attach`'s forward weight minus `detach_and_extract`'s
/// reverse weight is the log acceptance ratio's numerator/denominator
/// pair a kernel combines across two scaffolds.
#[allow(clippy::too_many_arguments)]
pub fn regen_and_attach(
    trace: &mut Trace,
    scaffold: &mut Scaffold,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    let mut weight = 0.0;
    let border = scaffold.border().to_vec();

    for block in &border {
        for &node in block {
            if scaffold.absorbing().contains(&node) {
                weight += attach(trace, node, scaffold, should_restore, omega_db, gradients, rng)?;
            } else {
                weight += regen(trace, node, scaffold, should_restore, omega_db, gradients, rng)?;
                // An `if`-branch (or other ESR-ref) observation's root can
                // resolve to a different underlying choice than it did
                // before this proposal; re-pin it now that regen has
                // settled whatever it currently forwards from.
                if trace.arena().node(node)?.is_observed() {
                    weight += reconstrain(trace, node)?;
                }
            }
        }
    }

    Ok(weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::{root_environment, Environment};
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
    fn regen_and_attach_restores_a_detached_principal() {
        let mut trace = Trace::new();
        let env = root_environment();
        let operator = install_maker(&mut trace, 7.0);
        let output = apply_node(&mut trace, operator, &env);

        let mut scaffold = venture_scaffold::construct_scaffold(&trace, &[vec![]]).unwrap();
        // Build the scaffold around `output` manually since it is not yet random.
        trace.arena_mut().set_is_random(output, true).unwrap();
        scaffold = venture_scaffold::construct_scaffold(&trace, &[vec![output]]).unwrap();

        let mut gradients = Gradients::new();
        let mut rng = RngHandle::from_seed(1);

        let (_, mut omega_db) = crate::detach::detach_and_extract(&mut trace, &mut scaffold).unwrap();
        assert!(trace.arena().value(output).unwrap().is_none());

        let w = regen_and_attach(&mut trace, &mut scaffold, true, &mut omega_db, &mut gradients, &mut rng).unwrap();
        assert_eq!(w, 0.0);
        assert_eq!(trace.arena().value(output).unwrap(), Some(&Value::Number(7.0)));
    }
}
