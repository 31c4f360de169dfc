//! Applies a procedure at a request/output node pair, and restores an
//! entire previously-detached family in place during a rejected proposal.

use std::collections::BTreeSet;

use venture_core::{NodeId, RngHandle, Value, VentureError};
use venture_graph::Node;
use venture_scaffold::{OmegaDB, Scaffold};
use venture_sp::{RequestRecord, VentureSPRecord};
use venture_trace::Trace;

use crate::detach::{detach_family_rooted_at, remove_esr_parent};
use crate::eval::eval_family;
use crate::gradients::Gradients;
use crate::regen::regen;

/// Runs the operator's request-PSP at `request_node`, evaluates or
/// restores each exposed request, then runs the output-PSP at
/// `output_node`. Returns the accumulated log-weight.
#[allow(clippy::too_many_arguments)]
pub fn apply(
    trace: &mut Trace,
    request_node: NodeId,
    output_node: NodeId,
    scaffold: &mut Scaffold,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    let operands = trace.operand_values(output_node)?;
    let maker = trace.maker_of(output_node)?;
    let environment = trace.request_environment(request_node).cloned().ok_or_else(|| {
        VentureError::graph(
            "no-request-environment",
            "request node has no recorded lexical environment",
        )
    })?;

    let record: RequestRecord = {
        let sp = trace
            .made_sp(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.request_psp.simulate_requests(&operands, &environment, maker)?
    };
    trace.set_request_record(request_node, record.clone());

    let mut weight = eval_requests(
        trace,
        request_node,
        output_node,
        &record,
        scaffold,
        should_restore,
        omega_db,
        gradients,
        rng,
    )?;

    weight += apply_psp(trace, output_node, maker, scaffold, should_restore, omega_db, gradients, rng)?;

    Ok(weight)
}

/// Finds or builds the trace family for each exposed request, and (when
/// not restoring) runs each latent request's own simulation hook.
///
/// A request-PSP can expose a different set of keys each time it runs (an
/// `if` switching branches, say). Whatever was registered for this
/// request node but is absent from the fresh `record` is now orphaned
/// brush and is torn down here, symmetrically whether this call is the
/// original trial or a rejected trial's restore: restoring recomputes the
/// same old record from the just-restored operands, so whatever the
/// trial built that does not appear in it is exactly the brush to discard.
#[allow(clippy::too_many_arguments)]
fn eval_requests(
    trace: &mut Trace,
    request_node: NodeId,
    output_node: NodeId,
    record: &RequestRecord,
    scaffold: &mut Scaffold,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    let mut weight = 0.0;
    let mut live_keys = BTreeSet::new();

    for esr in &record.esrs {
        live_keys.insert(esr.key.clone());
        let scope_node = esr.shared_scope.unwrap_or(request_node);

        if !trace.has_family(scope_node, &esr.key) {
            let esr_parent = if should_restore {
                let parent = omega_db.take_esr_parent(request_node, &esr.key).ok_or_else(|| {
                    VentureError::inference(
                        "missing-restore-esr",
                        format!("no ESR parent recorded to restore for key {}", esr.key),
                    )
                })?;
                weight += restore(trace, parent, scaffold, omega_db, gradients, rng)?;
                parent
            } else {
                let (w, parent) =
                    eval_family(trace, &esr.expression, &esr.environment, scaffold, omega_db, gradients, rng)?;
                weight += w;
                parent
            };
            trace.register_family(scope_node, &esr.key, esr_parent);
            trace.arena_mut().add_esr_parent(output_node, esr_parent)?;
        } else {
            let esr_parent = trace
                .family(scope_node, &esr.key)
                .expect("has_family just returned true for this key");
            // A shared-scope family may already be wired elsewhere but
            // new to this particular output node (another call site
            // reusing `mem`'s cache for the first time); a request-node-
            // scoped family reaching here is always already wired, since
            // the only writer of its (request_node, key) entry is this
            // same branch on this same node.
            let already_wired = match trace.arena().node(output_node)?.clone() {
                Node::Output { esr_parents, .. } => esr_parents.contains(&esr_parent),
                _ => false,
            };
            if !already_wired {
                trace.arena_mut().add_esr_parent(output_node, esr_parent)?;
            }
            weight += regen(trace, esr_parent, scaffold, should_restore, omega_db, gradients, rng)?;
        }
    }

    // No built-in procedure currently issues latent simulation requests;
    // nothing to simulate or restore for `record.lsrs`.

    let stale: Vec<(String, NodeId)> = trace
        .families_for(request_node)
        .into_iter()
        .filter(|(key, _)| !live_keys.contains(key))
        .collect();
    for (key, esr_parent) in stale {
        trace.unregister_family(request_node, &key);
        remove_esr_parent(trace, output_node, esr_parent)?;
        if !should_restore {
            omega_db.record_esr_parent(request_node, key, esr_parent);
        }
        weight -= detach_family_rooted_at(trace, esr_parent, scaffold, omega_db)?;
    }

    Ok(weight)
}

/// Runs the output-PSP at `output_node`: installs a fresh made-SP for a
/// maker application, otherwise draws (or restores, or variationally
/// proposes) a value and incorporates it into the maker's aux.
#[allow(clippy::too_many_arguments)]
fn apply_psp(
    trace: &mut Trace,
    output_node: NodeId,
    maker: NodeId,
    scaffold: &mut Scaffold,
    should_restore: bool,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    let operands = trace.operand_values(output_node)?;
    let (is_maker, is_random, is_esr_ref) = {
        let sp = trace
            .made_sp(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        (sp.output_psp.is_maker(), sp.output_psp.is_random(), sp.output_psp.is_esr_ref())
    };

    if is_esr_ref {
        let esr_parent = match trace.arena().node(output_node)?.clone() {
            Node::Output { esr_parents, .. } => *esr_parents.first().ok_or_else(|| {
                VentureError::graph("no-esr-parent", "an ESR-ref output node has no ESR parent to forward")
            })?,
            _ => return Err(VentureError::graph("not-an-output", "apply_psp called on a non-output node")),
        };
        let value = trace
            .arena()
            .value(esr_parent)?
            .cloned()
            .ok_or_else(|| VentureError::graph("no-value", "ESR parent has no value to forward"))?;
        trace.arena_mut().set_value(output_node, value)?;
        trace.arena_mut().set_is_random(output_node, false)?;
        return Ok(0.0);
    }

    if is_maker {
        let record: VentureSPRecord = if should_restore {
            let (sp, aux) = omega_db.take_made_sp(output_node).ok_or_else(|| {
                VentureError::inference("missing-restore-made-sp", "no made SP recorded to restore")
            })?;
            VentureSPRecord { sp, aux }
        } else {
            let sp = trace.made_sp(maker).expect("checked above");
            let aux = trace.sp_aux(maker);
            sp.output_psp.simulate_made_sp(&operands, aux, rng)?
        };
        trace.install_made_sp(output_node, record.sp, record.aux);
        trace.arena_mut().set_value(output_node, Value::SPRef(output_node))?;
        trace.arena_mut().set_is_random(output_node, is_random)?;
        return Ok(0.0);
    }

    let mut weight = 0.0;
    let value = if should_restore {
        omega_db
            .take_value(output_node)
            .ok_or_else(|| VentureError::inference("missing-restore-value", "no value recorded to restore"))?
    } else if scaffold.is_variational(output_node) {
        let sp = trace.made_sp(maker).expect("checked above");
        let kernel = sp.output_psp.variational_kernel().ok_or_else(|| {
            VentureError::inference(
                "no-variational-kernel",
                "node was marked variational but its PSP advertises no variational kernel",
            )
        })?;
        let drawn = kernel.simulate(rng)?;
        let prior_density = sp.output_psp.log_density(&drawn, &operands, trace.sp_aux(maker))?;
        let kernel_density = kernel.log_density(&drawn);
        weight += prior_density - kernel_density;
        gradients.insert(output_node, kernel.gradient_of_log_density(&drawn));
        drawn
    } else {
        let sp = trace.made_sp(maker).expect("checked above");
        sp.output_psp.simulate(&operands, trace.sp_aux(maker), rng)?
    };

    trace.arena_mut().set_value(output_node, value.clone())?;
    trace.arena_mut().set_is_random(output_node, is_random)?;
    if is_random {
        trace.register_random(output_node);
    }

    {
        let (sp, aux) = trace
            .sp_and_aux_mut(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.incorporate(&value, &operands, aux)?;
    }

    Ok(weight)
}

/// Rebuilds a previously-detached family's values in place, without
/// re-deriving its shape: every node in `root`'s structural ancestry
/// still exists in the arena (detach only clears values and
/// unincorporates), so restoring just walks it back to life using the
/// snapshot `detach_and_extract` left in `omega_db`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn restore(
    trace: &mut Trace,
    node: NodeId,
    scaffold: &mut Scaffold,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<f64, VentureError> {
    match trace.arena().node(node)?.clone() {
        Node::Constant => Ok(0.0),
        Node::Lookup { source } => {
            let weight = restore(trace, source, scaffold, omega_db, gradients, rng)?;
            let value = trace
                .arena()
                .value(source)?
                .cloned()
                .ok_or_else(|| VentureError::graph("no-value", "lookup source has no value after restore"))?;
            trace.arena_mut().set_value(node, value)?;
            Ok(weight)
        }
        Node::Output { operator, operands, request, .. } => {
            // An operator/operand detach never touched (a shared global
            // procedure, an enclosing variable) still holds its live
            // value: nothing was snapshotted for it, so leave it alone.
            if !omega_db.has_value(node) && !omega_db.has_made_sp(node) {
                return Ok(0.0);
            }
            let mut weight = restore(trace, operator, scaffold, omega_db, gradients, rng)?;
            for operand in operands {
                weight += restore(trace, operand, scaffold, omega_db, gradients, rng)?;
            }
            weight += apply(trace, request, node, scaffold, true, omega_db, gradients, rng)?;
            Ok(weight)
        }
        Node::Request { .. } => Err(VentureError::graph(
            "restore-on-request-node",
            "restore is only called on family roots, never their sibling request node",
        )),
    }
}
