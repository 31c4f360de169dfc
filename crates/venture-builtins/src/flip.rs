//! `flip`: a Bernoulli coin, defaulting to fair, with an optional weight
//! operand (`(flip)` or `(flip 0.3)`).

use venture_core::{RngHandle, Value, VentureError};
use venture_sp::{NullRequestPSP, OutputPSP, SPAux, UnitAux, SP};

/// Builds the `flip` stochastic procedure.
pub fn sp() -> SP {
    SP::new(Box::new(NullRequestPSP), Box::new(FlipPsp), || Box::new(UnitAux) as Box<dyn SPAux>)
}

#[derive(Debug)]
struct FlipPsp;

fn weight_of(operands: &[Value]) -> Result<f64, VentureError> {
    match operands {
        [] => Ok(0.5),
        [p] => p.as_number(),
        _ => Err(VentureError::illegal_program("flip-arity", "flip takes zero or one operand")),
    }
}

impl OutputPSP for FlipPsp {
    fn simulate(&self, operands: &[Value], _aux: Option<&dyn SPAux>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let p = weight_of(operands)?;
        Ok(Value::Boolean(rng.uniform() < p))
    }

    fn log_density(&self, value: &Value, operands: &[Value], _aux: Option<&dyn SPAux>) -> Result<f64, VentureError> {
        let p = weight_of(operands)?;
        Ok(if value.as_boolean()? { p.ln() } else { (1.0 - p).ln() })
    }

    fn incorporate(&self, _value: &Value, _operands: &[Value], _aux: &mut dyn SPAux) -> Result<(), VentureError> {
        Ok(())
    }

    fn unincorporate(&self, _value: &Value, _operands: &[Value], _aux: &mut dyn SPAux) -> Result<(), VentureError> {
        Ok(())
    }

    fn is_random(&self) -> bool {
        true
    }

    fn enumerate_values(&self, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Option<Vec<Value>> {
        Some(vec![Value::Boolean(true), Value::Boolean(false)])
    }

    fn log_density_bound(&self, operands: &[Value], _aux: Option<&dyn SPAux>) -> Option<f64> {
        let p = weight_of(operands).ok()?;
        Some(p.ln().max((1.0 - p).ln()))
    }
}
