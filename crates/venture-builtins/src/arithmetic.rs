//! Deterministic numeric primitives: `add`, `mul`, `sub`.

use venture_core::{RngHandle, Value, VentureError};
use venture_sp::{NullRequestPSP, OutputPSP, SPAux, UnitAux, SP};

/// Builds the `add` stochastic procedure (variadic sum, `(add)` is `0`).
pub fn add_sp() -> SP {
    deterministic_sp(Fold::Add)
}

/// Builds the `mul` stochastic procedure (variadic product, `(mul)` is `1`).
pub fn mul_sp() -> SP {
    deterministic_sp(Fold::Mul)
}

/// Builds the `sub` stochastic procedure: binary subtraction `(sub a b)`.
pub fn sub_sp() -> SP {
    deterministic_sp(Fold::Sub)
}

fn deterministic_sp(fold: Fold) -> SP {
    SP::new(Box::new(NullRequestPSP), Box::new(ArithmeticPsp(fold)), || Box::new(UnitAux) as Box<dyn SPAux>)
}

#[derive(Debug, Clone, Copy)]
enum Fold {
    Add,
    Mul,
    Sub,
}

#[derive(Debug)]
struct ArithmeticPsp(Fold);

fn numbers_of(operands: &[Value]) -> Result<Vec<f64>, VentureError> {
    operands.iter().map(Value::as_number).collect()
}

impl OutputPSP for ArithmeticPsp {
    fn simulate(&self, operands: &[Value], _aux: Option<&dyn SPAux>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        let values = numbers_of(operands)?;
        let result = match self.0 {
            Fold::Add => values.iter().sum(),
            Fold::Mul => values.iter().product(),
            Fold::Sub => match values.as_slice() {
                [a, b] => a - b,
                _ => return Err(VentureError::illegal_program("sub-arity", "sub takes exactly two operands")),
            },
        };
        Ok(Value::Number(result))
    }

    fn log_density(&self, value: &Value, operands: &[Value], aux: Option<&dyn SPAux>) -> Result<f64, VentureError> {
        let expected = self.simulate(operands, aux, &mut RngHandle::from_seed(0))?;
        Ok(if *value == expected { 0.0 } else { f64::NEG_INFINITY })
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sums_every_operand() {
        let psp = ArithmeticPsp(Fold::Add);
        let mut rng = RngHandle::from_seed(0);
        let result = psp
            .simulate(&[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)], None, &mut rng)
            .unwrap();
        assert_eq!(result, Value::Number(6.0));
    }

    #[test]
    fn sub_is_binary() {
        let psp = ArithmeticPsp(Fold::Sub);
        let mut rng = RngHandle::from_seed(0);
        let result = psp.simulate(&[Value::Number(5.0), Value::Number(2.0)], None, &mut rng).unwrap();
        assert_eq!(result, Value::Number(3.0));
    }
}
