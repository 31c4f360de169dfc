//! Rejection-sampling proposal: like plain Metropolis-Hastings, but every
//! random node the scaffold resamples must advertise a finite
//! `log_density_bound` before any proposal is attempted. A scaffold
//! containing even one random node whose PSP offers no bound fails
//! immediately with a clear error, instead of looping forever trying to
//! bound a density that was never supplied.
//!
//! `original_source` never finished wiring a rejection operator into
//! `infer.py` (only `MHOperator`, `MeanfieldOperator`, and `PGibbsOperator`
//! are there), so this has no direct port; it reuses `MhOperator`'s
//! detach/regen mechanics and adds the up-front bound check.

use venture_core::{RngHandle, VentureError};
use venture_graph::Node;
use venture_regen::{detach_and_extract, regen_and_attach, Gradients};
use venture_scaffold::{OmegaDB, Scaffold};
use venture_trace::Trace;

use crate::operator::Operator;

/// Rejection-sampling single-site proposal. Requires every resampled
/// random output node's PSP to advertise a `log_density_bound`.
#[derive(Debug, Default)]
pub struct RejectionOperator {
    rho_db: Option<OmegaDB>,
}

impl RejectionOperator {
    /// Creates a fresh operator with no saved state.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_bounds(trace: &Trace, scaffold: &Scaffold) -> Result<(), VentureError> {
        for &node in scaffold.resampling().keys() {
            match trace.arena().node(node)? {
                Node::Output { is_random: true, .. } => {}
                _ => continue,
            }
            let sp = trace.sp_applied_at(node)?;
            let maker = trace.maker_of(node)?;
            let aux = trace.sp_aux(maker);
            let operands = trace.operand_values(node)?;
            if sp.output_psp.log_density_bound(&operands, aux).is_none() {
                return Err(VentureError::inference(
                    "rejection-mh-no-density-bound",
                    format!(
                        "node {} has no log-density bound; rejection MH cannot propose for it",
                        node.as_raw()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Operator for RejectionOperator {
    fn propose(&mut self, trace: &mut Trace, scaffold: &mut Scaffold, rng: &mut RngHandle) -> Result<f64, VentureError> {
        Self::check_bounds(trace, scaffold)?;

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
    struct UnboundedFlipPsp;

    impl OutputPSP for UnboundedFlipPsp {
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

    #[derive(Debug)]
    struct BoundedFlipPsp;

    impl OutputPSP for BoundedFlipPsp {
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
        fn log_density_bound(&self, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Option<f64> {
            Some(0.0)
        }
    }

    fn install_flip(trace: &mut Trace, psp: Box<dyn OutputPSP>) -> venture_core::NodeId {
        let maker = trace.create_constant_node(Value::Nil);
        let sp = SP::new(Box::new(NullRequestPSP), psp, || Box::new(UnitAux) as Box<dyn SPAux>);
        trace.install_made_sp(maker, sp, Box::new(UnitAux));
        let (_, output) = trace.create_application_nodes(maker, &[]).unwrap();
        trace.arena_mut().set_is_random(output, true).unwrap();
        trace.arena_mut().set_value(output, Value::Boolean(true)).unwrap();
        trace.register_random(output);
        output
    }

    #[test]
    fn fails_early_without_looping_when_no_bound_is_supplied() {
        let mut trace = Trace::new();
        let output = install_flip(&mut trace, Box::new(UnboundedFlipPsp));

        let indexer = ScaffoldIndexer::default_scope();
        let mut operator = RejectionOperator::new();
        let mut rng = RngHandle::from_seed(1);

        let err = mix_mh(&mut trace, &indexer, &mut operator, &mut rng).unwrap_err();
        assert_eq!(err.info().code, "rejection-mh-no-density-bound");
        // The trace is untouched: propose bailed out before detaching anything.
        assert_eq!(trace.arena().value(output).unwrap(), Some(&Value::Boolean(true)));
    }

    #[test]
    fn proceeds_normally_when_every_node_supplies_a_bound() {
        let mut trace = Trace::new();
        let output = install_flip(&mut trace, Box::new(BoundedFlipPsp));

        let indexer = ScaffoldIndexer::default_scope();
        let mut operator = RejectionOperator::new();
        let mut rng = RngHandle::from_seed(1);

        for _ in 0..10 {
            mix_mh(&mut trace, &indexer, &mut operator, &mut rng).unwrap();
            assert!(trace.arena().value(output).unwrap().is_some());
            assert!(trace.registry().contains(output));
        }
    }
}
