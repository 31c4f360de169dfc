//! Constrains (and unconstrains) a random choice to an observed value.
//!
//! The observed flag lives on the directive's own root node, not on
//! whatever random choice it currently resolves to: an `if`-branch (or
//! other ESR-ref) observation can point at a different underlying choice
//! from one proposal to the next, so `reconstrain` re-walks the
//! indirection and re-forces the value every time `regen_and_attach`
//! revisits the root, rather than pinning a single node once and forgetting.

use venture_core::{NodeId, RngHandle, Value, VentureError};
use venture_graph::Node;
use venture_trace::Trace;

/// Marks `node` — a directive's root — as observed to `value`, and
/// forces it now against whatever random choice it currently resolves
/// to through any `Lookup`/ESR-ref indirection.
pub fn constrain(trace: &mut Trace, node: NodeId, value: Value) -> Result<f64, VentureError> {
    trace.arena_mut().set_is_observed(node, true)?;
    trace.arena_mut().set_observed_value(node, Some(value.clone()))?;
    force(trace, node, value)
}

/// Re-applies `node`'s already-recorded observation to whatever random
/// choice it currently resolves to. Called from `regen_and_attach` for
/// every border node marked observed, since the node a root's
/// observation lands on can change across proposals.
pub fn reconstrain(trace: &mut Trace, node: NodeId) -> Result<f64, VentureError> {
    let value = trace
        .arena()
        .observed_value(node)?
        .cloned()
        .ok_or_else(|| VentureError::graph("no-observed-value", "node is not marked observed"))?;
    force(trace, node, value)
}

/// Releases a previously constrained choice back into the pool of
/// unconstrained random choices a kernel can propose to resample,
/// without redrawing it: its current (observed) value stays until
/// something actually regenerates it.
pub fn unconstrain(trace: &mut Trace, node: NodeId) -> Result<(), VentureError> {
    trace.arena_mut().set_is_observed(node, false)?;
    trace.arena_mut().set_observed_value(node, None)?;

    let resolved = resolve_through_lookups(trace, node)?;
    if !trace.arena().node(resolved)?.is_random_output() {
        return Err(VentureError::illegal_program(
            "not-a-random-choice",
            "only a random choice can be unconstrained",
        ));
    }
    trace.register_random(resolved);
    Ok(())
}

/// Swaps `node`'s (resolved through any indirection) incorporated
/// contribution from its current value to `value`, returning the log
/// density of the new value and removing it from the random-choice
/// registry: a constrained node is no longer a candidate principal node
/// for an unconditional proposal.
fn force(trace: &mut Trace, node: NodeId, value: Value) -> Result<f64, VentureError> {
    let resolved = resolve_through_lookups(trace, node)?;
    if !trace.arena().node(resolved)?.is_random_output() {
        return Err(VentureError::illegal_program(
            "not-a-random-choice",
            "only a random choice can be constrained",
        ));
    }

    let operands = trace.operand_values(resolved)?;
    let maker = trace.maker_of(resolved)?;
    let old_value = trace
        .arena()
        .value(resolved)?
        .cloned()
        .ok_or_else(|| VentureError::graph("no-value", "node has no value to constrain"))?;

    {
        let (sp, aux) = trace
            .sp_and_aux_mut(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.unincorporate(&old_value, &operands, aux)?;
    }

    let weight = {
        let sp = trace
            .made_sp(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.log_density(&value, &operands, trace.sp_aux(maker))?
    };

    {
        let (sp, aux) = trace
            .sp_and_aux_mut(maker)
            .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
        sp.output_psp.incorporate(&value, &operands, aux)?;
    }

    trace.arena_mut().set_value(resolved, value)?;
    trace.unregister_random(resolved);
    Ok(weight)
}

fn resolve_through_lookups(trace: &Trace, mut node: NodeId) -> Result<NodeId, VentureError> {
    loop {
        match trace.arena().node(node)?.clone() {
            Node::Lookup { source } => node = source,
            Node::Output { esr_parents, .. } => {
                let is_esr_ref = trace
                    .maker_of(node)
                    .ok()
                    .and_then(|maker| trace.made_sp(maker))
                    .map(|sp| sp.output_psp.is_esr_ref())
                    .unwrap_or(false);
                if !is_esr_ref {
                    return Ok(node);
                }
                node = *esr_parents.first().ok_or_else(|| {
                    VentureError::graph("no-esr-parent", "an ESR-ref output node has no ESR parent to forward")
                })?;
            }
            _ => return Ok(node),
        }
    }
}
