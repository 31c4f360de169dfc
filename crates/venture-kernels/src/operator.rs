//! The propose/accept/reject contract every transition operator
//! implements, driven by [`crate::mix_mh`].

use venture_core::{RngHandle, VentureError};
use venture_scaffold::Scaffold;
use venture_trace::Trace;

/// A single Metropolis-Hastings move against one scaffold.
///
/// `propose` mutates `trace` into the candidate state and returns the
/// move's own log-weight contribution to the acceptance ratio (not
/// including the index-correction term `mix_mh` adds separately).
/// `accept` commits to the proposed state; `reject` undoes it, restoring
/// `trace` to exactly what `propose` found it in.
pub trait Operator {
    /// Proposes a move, mutating `trace` in place.
    fn propose(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<f64, VentureError>;

    /// Commits to the state `propose` left `trace` in.
    fn accept(&mut self);

    /// Restores `trace` to its state before the matching `propose` call.
    fn reject(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<(), VentureError>;
}

/// Samples an index, proposes a move against it, and accepts or rejects
/// by the Metropolis-Hastings rule. Returns whether the move was
/// accepted.
///
/// Ported from `original_source`'s `infer.py` `mixMH`.
pub fn mix_mh(
    trace: &mut Trace,
    indexer: &crate::indexer::ScaffoldIndexer,
    operator: &mut dyn Operator,
    rng: &mut RngHandle,
) -> Result<bool, VentureError> {
    let (mut scaffold, principal) = indexer.sample_index(trace, rng)?;
    let rho_mix = indexer.log_density_of_index(trace, &principal)?;

    let log_alpha = operator.propose(trace, &mut scaffold, rng)?;

    let xi_mix = indexer.log_density_of_index(trace, &principal)?;
    let threshold = xi_mix + log_alpha - rho_mix;

    if rng.uniform().ln() < threshold {
        operator.accept();
        Ok(true)
    } else {
        operator.reject(trace, &mut scaffold, rng)?;
        Ok(false)
    }
}
