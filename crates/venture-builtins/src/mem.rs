//! `mem`: wraps a procedure so that every application with an
//! operand-tuple already seen anywhere in the trace returns the exact
//! same (possibly random) result, instead of drawing a fresh one.
//!
//! The memo table lives in the family cache under the made-SP's own
//! node id as the scope (see `Esr::shared_scope`), so two calls to the
//! same memoized procedure from unrelated call sites with equal operands
//! share one underlying random choice.

use venture_core::{Environment, NodeId, RngHandle, Value, VentureError};
use venture_sp::{Esr, NullRequestPSP, OutputPSP, RequestPSP, RequestRecord, SPAux, UnitAux, VentureSPRecord, SP};

/// Builds the `mem` maker: `(mem proc)` returns a memoizing wrapper
/// around `proc`.
pub fn sp() -> SP {
    SP::new(Box::new(NullRequestPSP), Box::new(MakeMemPsp), || Box::new(UnitAux) as Box<dyn SPAux>)
}

#[derive(Debug)]
struct MakeMemPsp;

impl OutputPSP for MakeMemPsp {
    fn simulate(&self, _operands: &[Value], _aux: Option<&dyn SPAux>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Err(VentureError::illegal_program("mem-is-a-maker", "mem only ever constructs a made SP"))
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

    fn is_maker(&self) -> bool {
        true
    }

    fn simulate_made_sp(
        &self,
        operands: &[Value],
        _aux: Option<&dyn SPAux>,
        _rng: &mut RngHandle,
    ) -> Result<VentureSPRecord, VentureError> {
        let proc = match operands {
            [proc] => proc.clone(),
            _ => return Err(VentureError::illegal_program("mem-arity", "mem takes exactly one operand")),
        };
        let sp = SP::new(
            Box::new(MemoizedRequestPsp { proc }),
            Box::new(MemoizedOutputPsp),
            || Box::new(UnitAux) as Box<dyn SPAux>,
        );
        Ok(VentureSPRecord { sp, aux: Box::new(UnitAux) })
    }
}

#[derive(Debug)]
struct MemoizedRequestPsp {
    proc: Value,
}

impl RequestPSP for MemoizedRequestPsp {
    fn simulate_requests(&self, operands: &[Value], environment: &Environment, maker: NodeId) -> Result<RequestRecord, VentureError> {
        let key = memo_key(operands);
        let mut call = vec![self.proc.clone()];
        call.extend(operands.iter().cloned().map(quote));
        let expression = Value::list(call);
        Ok(RequestRecord {
            esrs: vec![Esr::shared(key, expression, environment.clone(), maker)],
            lsrs: vec![],
        })
    }
}

fn quote(value: Value) -> Value {
    Value::list(vec![Value::Symbol("quote".to_string()), value])
}

fn memo_key(operands: &[Value]) -> String {
    operands.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\u{1}")
}

#[derive(Debug)]
struct MemoizedOutputPsp;

impl OutputPSP for MemoizedOutputPsp {
    fn simulate(&self, _operands: &[Value], _aux: Option<&dyn SPAux>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Err(VentureError::illegal_program(
            "mem-call-is-esr-ref",
            "a memoized call's output is always forwarded from its cached ESR parent",
        ))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_key_distinguishes_different_operand_tuples() {
        assert_ne!(memo_key(&[Value::Number(1.0)]), memo_key(&[Value::Number(2.0)]));
        assert_eq!(memo_key(&[Value::Number(1.0)]), memo_key(&[Value::Number(1.0)]));
    }
}
