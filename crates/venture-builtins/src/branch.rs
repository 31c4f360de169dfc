//! `if`: a conditional whose branches are call-site-quoted expressions
//! (`(if pred (quote then-exp) (quote else-exp))`), evaluated lazily —
//! only the taken branch is ever requested, and the branch node's value
//! is simply a forward of whichever one that was.

use venture_core::{Environment, NodeId, RngHandle, Value, VentureError};
use venture_sp::{Esr, OutputPSP, RequestPSP, RequestRecord, SPAux, UnitAux, SP};

/// Builds the `if` stochastic procedure.
pub fn sp() -> SP {
    SP::new(Box::new(IfRequestPsp), Box::new(IfOutputPsp), || Box::new(UnitAux) as Box<dyn SPAux>)
}

#[derive(Debug)]
struct IfRequestPsp;

impl RequestPSP for IfRequestPsp {
    fn simulate_requests(&self, operands: &[Value], environment: &Environment, _maker: NodeId) -> Result<RequestRecord, VentureError> {
        let (predicate, then_branch, else_branch) = match operands {
            [p, t, e] => (p, t, e),
            _ => return Err(VentureError::illegal_program("if-arity", "if takes exactly a predicate and two branches")),
        };
        let chosen = if predicate.as_boolean()? { then_branch.clone() } else { else_branch.clone() };
        Ok(RequestRecord {
            esrs: vec![Esr::new("if", chosen, environment.clone())],
            lsrs: vec![],
        })
    }
}

#[derive(Debug)]
struct IfOutputPsp;

impl OutputPSP for IfOutputPsp {
    fn simulate(&self, _operands: &[Value], _aux: Option<&dyn SPAux>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Err(VentureError::illegal_program("if-is-esr-ref", "if's output is always forwarded from its ESR parent"))
    }

    fn log_density(&self, _value: &Value, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Result<f64, VentureError> {
        Ok(0.0)
    }

    fn incorporate(&self, _value: &Value, _operands: &[Value], _aux: &mut dyn SPAux) -> Result<(), VentureError> {
        Ok(())
    }

    fn unincorporate(&self, _value: &Value, _operands: &[Value], _aux: &mut dyn SPAux) -> Result<(), VentureError> {
        Ok(())
    }

    fn is_random(&self) -> bool {
        false
    }

    fn is_esr_ref(&self) -> bool {
        true
    }
}
