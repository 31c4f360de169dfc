//! Particle Gibbs: resamples a scaffold's border by running `P`
//! independent particles forward from the prior, picking one in
//! proportion to its weight, and folding the original ("rho") particle
//! into the normalizing constant so the move stays reversible.
//!
//! Ported from `original_source`'s `infer.py` `PGibbsOperator`. The
//! source hard-codes its own `T` (the number of ordered resampling
//! groups) to `1` under a comment marking the general `T > 1` path as
//! unfinished; this keeps that restriction explicit rather than
//! executing the untested multi-group path. `T` here is simply
//! `scaffold.border().len()`, since our `Scaffold` already represents an
//! ordered-block index as one border group per block.
use venture_core::{RngHandle, VentureError};
use venture_regen::{detach_and_extract, regen_and_attach, Gradients};
use venture_scaffold::{OmegaDB, Scaffold};
use venture_trace::Trace;

use crate::operator::Operator;

/// Particle Gibbs with `P` particles, single-scaffold (`T = 1`) only.
#[derive(Debug)]
pub struct PGibbsOperator {
    particles: usize,
    rho_db: Option<OmegaDB>,
    noop: bool,
}

impl PGibbsOperator {
    /// Creates an operator that resamples with `particles` particles.
    pub fn new(particles: usize) -> Self {
        Self {
            particles,
            rho_db: None,
            noop: false,
        }
    }
}

impl Operator for PGibbsOperator {
    fn propose(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<f64, VentureError> {
        if scaffold.border().len() != 1 {
            return Err(VentureError::inference(
                "pgibbs-t-not-supported",
                "particle Gibbs only supports a single border group (T = 1)",
            ));
        }

        let (rho_weight, mut rho_db) = detach_and_extract(trace, scaffold)?;

        if self.particles == 0 {
            regen_and_attach(trace, scaffold, true, &mut rho_db, &mut Gradients::new(), rng)?;
            self.noop = true;
            self.rho_db = None;
            return Ok(0.0);
        }
        self.noop = false;

        let mut xi_weights = Vec::with_capacity(self.particles);
        let mut particle_dbs = Vec::with_capacity(self.particles);
        for _ in 0..self.particles {
            regen_and_attach(trace, scaffold, false, &mut OmegaDB::new(), &mut Gradients::new(), rng)?;
            let (weight, db) = detach_and_extract(trace, scaffold)?;
            xi_weights.push(weight);
            particle_dbs.push(db);
        }

        let final_index = sample_categorical(&xi_weights, rng);

        let mut weight_minus_xi_terms: Vec<f64> = xi_weights
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != final_index)
            .map(|(_, w)| *w)
            .collect();
        weight_minus_xi_terms.push(rho_weight);
        let weight_minus_xi = logsumexp(&weight_minus_xi_terms);
        let weight_minus_rho = logsumexp(&xi_weights);

        let mut winning_db = particle_dbs.remove(final_index);
        regen_and_attach(trace, scaffold, true, &mut winning_db, &mut Gradients::new(), rng)?;

        self.rho_db = Some(rho_db);
        Ok(weight_minus_rho - weight_minus_xi)
    }

    fn accept(&mut self) {
        self.rho_db = None;
    }

    fn reject(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<(), VentureError> {
        if self.noop {
            return Ok(());
        }
        let mut rho_db = self.rho_db.take().ok_or_else(|| {
            VentureError::inference("no-proposal-to-reject", "reject called without a matching propose")
        })?;
        detach_and_extract(trace, scaffold)?;
        regen_and_attach(trace, scaffold, true, &mut rho_db, &mut Gradients::new(), rng)?;
        Ok(())
    }
}

/// Samples an index in proportion to `exp(log_weights[i])`, numerically
/// stably.
fn sample_categorical(log_weights: &[f64], rng: &mut RngHandle) -> usize {
    let max = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = log_weights.iter().map(|w| (w - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    let mut draw = rng.uniform() * total;
    for (index, weight) in weights.iter().enumerate() {
        if draw < *weight {
            return index;
        }
        draw -= *weight;
    }
    weights.len() - 1
}

fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::ScaffoldIndexer;
    use crate::operator::mix_mh;
    use venture_core::Value;
    use venture_sp::{NullRequestPSP, OutputPSP, SPAux, UnitAux, SP};

    #[derive(Debug)]
    struct FlipPsp;

    impl OutputPSP for FlipPsp {
        fn simulate(&self, _o: &[Value], _a: Option<&dyn SPAux>, rng: &mut RngHandle) -> Result<Value, VentureError> {
            Ok(Value::Boolean(rng.uniform() < 0.5))
        }
        fn log_density(&self, _v: &Value, _o: &[Value], _a: Option<&dyn SPAux>) -> Result<f64, VentureError> {
            Ok((0.5_f64).ln())
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

    fn setup() -> (Trace, venture_core::NodeId) {
        let mut trace = Trace::new();
        let maker = trace.create_constant_node(Value::Nil);
        let sp = SP::new(
            Box::new(NullRequestPSP),
            Box::new(FlipPsp),
            || Box::new(UnitAux) as Box<dyn SPAux>,
        );
        trace.install_made_sp(maker, sp, Box::new(UnitAux));
        let (_, output) = trace.create_application_nodes(maker, &[]).unwrap();
        trace.arena_mut().set_is_random(output, true).unwrap();
        trace.arena_mut().set_value(output, Value::Boolean(true)).unwrap();
        trace.register_random(output);
        (trace, output)
    }

    #[test]
    fn zero_particles_is_a_no_op() {
        let (mut trace, output) = setup();
        let indexer = ScaffoldIndexer::default_scope();
        let mut operator = PGibbsOperator::new(0);
        let mut rng = RngHandle::from_seed(7);

        mix_mh(&mut trace, &indexer, &mut operator, &mut rng).unwrap();

        assert_eq!(trace.arena().value(output).unwrap(), Some(&Value::Boolean(true)));
    }

    #[test]
    fn several_particles_leaves_a_valid_trace() {
        let (mut trace, output) = setup();
        let indexer = ScaffoldIndexer::default_scope();
        let mut operator = PGibbsOperator::new(5);
        let mut rng = RngHandle::from_seed(8);

        mix_mh(&mut trace, &indexer, &mut operator, &mut rng).unwrap();

        assert!(trace.arena().value(output).unwrap().is_some());
        assert!(trace.registry().contains(output));
    }
}
