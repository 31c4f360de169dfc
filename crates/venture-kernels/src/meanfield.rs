//! Mean-field variational inference: iteratively nudges each variational
//! node's parametric proposal towards the posterior by stochastic
//! gradient ascent, then finishes with one ordinary Metropolis-Hastings
//! correction against the fully-optimized proposal.
//!
//! Ported from `original_source`'s `infer.py` `MeanfieldOperator` /
//! `registerVariationalLKernels`; falls back to plain [`MhOperator`] when
//! no node in the scaffold advertises a variational kernel.

use venture_core::{NodeId, RngHandle, VentureError};
use venture_regen::{detach_and_extract, regen_and_attach, Gradients};
use venture_scaffold::{OmegaDB, Scaffold};
use venture_trace::Trace;

use crate::mh::MhOperator;
use crate::operator::Operator;

/// Marks every node in `scaffold` whose output-PSP advertises a
/// variational kernel, skipping constrained nodes and nodes whose own
/// operator is itself resampling (the operator needs to be pinned down
/// for the variational proposal's shape to be well-defined).
///
/// Returns the marked nodes paired with the maker their kernel lives on,
/// and whether any were found.
fn register_variational_lkernels(trace: &Trace, scaffold: &mut Scaffold) -> Result<Vec<(NodeId, NodeId)>, VentureError> {
    let mut found = Vec::new();
    for &node in scaffold.resampling().keys() {
        let (operator, is_observed) = match trace.arena().node(node)? {
            venture_graph::Node::Output { operator, is_observed, .. } => (*operator, *is_observed),
            _ => continue,
        };
        if is_observed || scaffold.is_resampling(operator) {
            continue;
        }
        let maker = match trace.maker_of(node) {
            Ok(maker) => maker,
            Err(_) => continue,
        };
        let has_kernel = trace
            .made_sp(maker)
            .map(|sp| sp.output_psp.variational_kernel().is_some())
            .unwrap_or(false);
        if has_kernel {
            scaffold.mark_variational(node);
            found.push((node, maker));
        }
    }
    Ok(found)
}

/// Gradient-ascent mean-field proposal, falling back to plain MH when no
/// variational kernel applies.
#[derive(Debug)]
pub struct MeanfieldOperator {
    num_iters: usize,
    step_size: f64,
    rho_db: Option<OmegaDB>,
    delegate: Option<MhOperator>,
}

impl MeanfieldOperator {
    /// Creates an operator that runs `num_iters` gradient-ascent steps of
    /// size `step_size` before its final MH correction.
    pub fn new(num_iters: usize, step_size: f64) -> Self {
        Self {
            num_iters,
            step_size,
            rho_db: None,
            delegate: None,
        }
    }
}

impl Operator for MeanfieldOperator {
    fn propose(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<f64, VentureError> {
        let variational_nodes = register_variational_lkernels(trace, scaffold)?;
        if variational_nodes.is_empty() {
            let mut delegate = MhOperator::new();
            let weight = delegate.propose(trace, scaffold, rng)?;
            self.delegate = Some(delegate);
            return Ok(weight);
        }

        let (_, mut rho_db) = detach_and_extract(trace, scaffold)?;

        for _ in 0..self.num_iters {
            let mut gradients = Gradients::new();
            let gain = regen_and_attach(trace, scaffold, false, &mut OmegaDB::new(), &mut gradients, rng)?;
            detach_and_extract(trace, scaffold)?;

            for &(node, maker) in &variational_nodes {
                let gradient = gradients.get(&node).cloned().unwrap_or_default();
                let sp = trace
                    .made_sp_mut(maker)
                    .ok_or_else(|| VentureError::graph("no-made-sp", "no SP installed at the referenced maker"))?;
                if let Some(kernel) = sp.output_psp.variational_kernel_mut() {
                    let mut parameters = kernel.parameters();
                    for (param, grad) in parameters.iter_mut().zip(gradient.iter()) {
                        *param += self.step_size * gain * grad;
                    }
                    kernel.set_parameters(&parameters);
                }
            }
        }

        let rho_weight = regen_and_attach(trace, scaffold, true, &mut rho_db, &mut Gradients::new(), rng)?;
        detach_and_extract(trace, scaffold)?;
        let xi_weight = regen_and_attach(trace, scaffold, false, &mut OmegaDB::new(), &mut Gradients::new(), rng)?;

        self.rho_db = Some(rho_db);
        Ok(xi_weight - rho_weight)
    }

    fn accept(&mut self) {
        self.rho_db = None;
        if let Some(delegate) = &mut self.delegate {
            delegate.accept();
        }
    }

    fn reject(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<(), VentureError> {
        if let Some(mut delegate) = self.delegate.take() {
            return delegate.reject(trace, scaffold, rng);
        }
        let mut rho_db = self.rho_db.take().ok_or_else(|| {
            VentureError::inference("no-proposal-to-reject", "reject called without a matching propose")
        })?;
        detach_and_extract(trace, scaffold)?;
        regen_and_attach(trace, scaffold, true, &mut rho_db, &mut Gradients::new(), rng)?;
        Ok(())
    }
}
