//! `normal`: a Gaussian taking `(mean, stddev)`.

use std::f64::consts::PI;

use venture_core::{RngHandle, Value, VentureError};
use venture_sp::{NullRequestPSP, OutputPSP, SPAux, UnitAux, SP};

/// Builds the `normal` stochastic procedure.
pub fn sp() -> SP {
    SP::new(Box::new(NullRequestPSP), Box::new(NormalPsp), || Box::new(UnitAux) as Box<dyn SPAux>)
}

#[derive(Debug)]
struct NormalPsp;

fn params_of(operands: &[Value]) -> Result<(f64, f64), VentureError> {
    match operands {
        [mean, stddev] => Ok((mean.as_number()?, stddev.as_number()?)),
        _ => Err(VentureError::illegal_program("normal-arity", "normal takes exactly a mean and a stddev")),
    }
}

impl OutputPSP for NormalPsp {
    fn simulate(&self, operands: &[Value], _aux: Option<&dyn SPAux>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (mean, stddev) = params_of(operands)?;
        let u1 = rng.uniform().max(f64::MIN_POSITIVE);
        let u2 = rng.uniform();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        Ok(Value::Number(mean + stddev * z))
    }

    fn log_density(&self, value: &Value, operands: &[Value], _aux: Option<&dyn SPAux>) -> Result<f64, VentureError> {
        let (mean, stddev) = params_of(operands)?;
        let x = value.as_number()?;
        let z = (x - mean) / stddev;
        Ok(-0.5 * z * z - stddev.ln() - 0.5 * (2.0 * PI).ln())
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

    fn log_density_bound(&self, operands: &[Value], _aux: Option<&dyn SPAux>) -> Option<f64> {
        let (_, stddev) = params_of(operands).ok()?;
        Some(-stddev.ln() - 0.5 * (2.0 * PI).ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normal_density_peaks_at_zero() {
        let psp = NormalPsp;
        let at_zero = psp.log_density(&Value::Number(0.0), &[Value::Number(0.0), Value::Number(1.0)], None).unwrap();
        let at_one = psp.log_density(&Value::Number(1.0), &[Value::Number(0.0), Value::Number(1.0)], None).unwrap();
        assert!(at_zero > at_one);
    }

    #[test]
    fn simulate_is_deterministic_given_a_seed() {
        let psp = NormalPsp;
        let mut rng_a = RngHandle::from_seed(42);
        let mut rng_b = RngHandle::from_seed(42);
        let operands = [Value::Number(0.0), Value::Number(1.0)];
        let a = psp.simulate(&operands, None, &mut rng_a).unwrap();
        let b = psp.simulate(&operands, None, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }
}
