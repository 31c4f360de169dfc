//! Single-site (or single-block) Metropolis-Hastings: detach the
//! scaffold's border, regenerate it from the prior, and accept or
//! restore the saved snapshot.
//!
//! Ported from `original_source`'s `infer.py` `MHOperator`.

use venture_core::{RngHandle, VentureError};
use venture_regen::{detach_and_extract, regen_and_attach, Gradients};
use venture_scaffold::{OmegaDB, Scaffold};
use venture_trace::Trace;

use crate::operator::Operator;

/// Plain Metropolis-Hastings: no variational or particle machinery, just
/// detach-and-regen-from-the-prior.
#[derive(Debug, Default)]
pub struct MhOperator {
    rho_db: Option<OmegaDB>,
}

impl MhOperator {
    /// Creates a fresh operator with no saved state.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for MhOperator {
    fn propose(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<f64, VentureError> {
        let (rho_weight, mut rho_db) = detach_and_extract(trace, scaffold)?;
        let mut gradients = Gradients::new();
        let xi_weight = regen_and_attach(trace, scaffold, false, &mut rho_db, &mut gradients, rng)?;
        self.rho_db = Some(rho_db);
        Ok(xi_weight - rho_weight)
    }

    fn accept(&mut self) {
        self.rho_db = None;
    }

    fn reject(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<(), VentureError> {
        let mut rho_db = self.rho_db.take().ok_or_else(|| {
            VentureError::inference("no-proposal-to-reject", "reject called without a matching propose")
        })?;
        let mut gradients = Gradients::new();
        detach_and_extract(trace, scaffold)?;
        regen_and_attach(trace, scaffold, true, &mut rho_db, &mut gradients, rng)?;
        Ok(())
    }
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

    #[test]
    fn mh_step_leaves_a_valid_trace_either_way() {
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

        let indexer = ScaffoldIndexer::default_scope();
        let mut operator = MhOperator::new();
        let mut rng = RngHandle::from_seed(42);

        for _ in 0..10 {
            mix_mh(&mut trace, &indexer, &mut operator, &mut rng).unwrap();
            assert!(trace.arena().value(output).unwrap().is_some());
            assert!(trace.registry().contains(output));
        }
    }
}
