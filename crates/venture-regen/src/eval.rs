//! Evaluates a quoted expression against an environment, building fresh
//! trace nodes for each sub-expression.
//!
//! Expressions are plain [`Value`]s (symbols, pairs, self-evaluating
//! atoms), the same homoiconic representation Venture's own Lisp-like
//! surface syntax reduces to: there is no separate AST type to keep in
//! sync with the value model.

use venture_core::{lookup_symbol, Environment, NodeId, RngHandle, Value, VentureError};
use venture_scaffold::{OmegaDB, Scaffold};
use venture_trace::Trace;

use crate::apply::apply;
use crate::gradients::Gradients;

/// Evaluates `exp` in `env`, building new constant/lookup/application
/// nodes as needed, and returns the accumulated log-weight together with
/// the node holding the result.
///
/// Every node created here that sits inside a fresh application is marked
/// as brush on `scaffold`: it exists only because this evaluation
/// requested it, so a same-proposal detach must be able to tear it down
/// again on rejection.
pub fn eval_family(
    trace: &mut Trace,
    exp: &Value,
    env: &Environment,
    scaffold: &mut Scaffold,
    omega_db: &mut OmegaDB,
    gradients: &mut Gradients,
    rng: &mut RngHandle,
) -> Result<(f64, NodeId), VentureError> {
    match exp {
        Value::Symbol(name) => {
            let source = lookup_symbol(env, name)?;
            let node = trace.create_lookup_node(source)?;
            scaffold.mark_brush(node);
            Ok((0.0, node))
        }
        Value::Pair(head, _) if is_quote_symbol(head) => {
            let datum = quoted_datum(exp)?;
            let node = trace.create_constant_node(datum);
            scaffold.mark_brush(node);
            Ok((0.0, node))
        }
        Value::Pair(..) => {
            let items = list_to_vec(exp)?;
            let (operator_exp, operand_exps) = items
                .split_first()
                .ok_or_else(|| VentureError::illegal_program("empty-application", "cannot apply the empty list"))?;

            let mut weight = 0.0;

            let (operator_weight, operator_node) =
                eval_family(trace, operator_exp, env, scaffold, omega_db, gradients, rng)?;
            weight += operator_weight;

            let mut operand_nodes = Vec::with_capacity(operand_exps.len());
            for operand_exp in operand_exps {
                let (operand_weight, operand_node) =
                    eval_family(trace, operand_exp, env, scaffold, omega_db, gradients, rng)?;
                weight += operand_weight;
                operand_nodes.push(operand_node);
            }

            let (request_node, output_node) = trace.create_application_nodes(operator_node, &operand_nodes)?;
            trace.set_request_environment(request_node, env.clone());
            scaffold.mark_brush(request_node);
            scaffold.mark_brush(output_node);

            weight += apply(trace, request_node, output_node, scaffold, false, omega_db, gradients, rng)?;
            Ok((weight, output_node))
        }
        literal => {
            let node = trace.create_constant_node(literal.clone());
            scaffold.mark_brush(node);
            Ok((0.0, node))
        }
    }
}

/// Returns whether `exp` is a pair headed by the symbol `quote`.
fn is_quote_symbol(head: &Value) -> bool {
    matches!(head, Value::Symbol(s) if s == "quote")
}

/// Extracts the datum from a `(quote datum)` expression.
fn quoted_datum(exp: &Value) -> Result<Value, VentureError> {
    let items = list_to_vec(exp)?;
    match items.as_slice() {
        [_quote, datum] => Ok(datum.clone()),
        _ => Err(VentureError::illegal_program(
            "malformed-quote",
            "quote takes exactly one argument",
        )),
    }
}

/// Walks a proper list (`Value::Pair` chain terminated by `Value::Nil`)
/// into a `Vec`, erroring on an improper list.
pub fn list_to_vec(mut exp: &Value) -> Result<Vec<Value>, VentureError> {
    let mut items = Vec::new();
    loop {
        match exp {
            Value::Nil => return Ok(items),
            Value::Pair(head, tail) => {
                items.push((**head).clone());
                exp = tail;
            }
            _ => {
                return Err(VentureError::illegal_program(
                    "improper-list",
                    "expected a proper list",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::root_environment;

    #[test]
    fn self_evaluating_literal_becomes_a_constant_node() {
        let mut trace = Trace::new();
        let env = root_environment();
        let mut scaffold = Scaffold::default();
        let mut omega_db = OmegaDB::new();
        let mut gradients = Gradients::new();
        let mut rng = RngHandle::from_seed(1);

        let (weight, node) = eval_family(
            &mut trace,
            &Value::Number(3.0),
            &env,
            &mut scaffold,
            &mut omega_db,
            &mut gradients,
            &mut rng,
        )
        .unwrap();

        assert_eq!(weight, 0.0);
        assert_eq!(trace.arena().value(node).unwrap(), Some(&Value::Number(3.0)));
    }

    #[test]
    fn quote_returns_the_datum_unevaluated() {
        let mut trace = Trace::new();
        let env = root_environment();
        let mut scaffold = Scaffold::default();
        let mut omega_db = OmegaDB::new();
        let mut gradients = Gradients::new();
        let mut rng = RngHandle::from_seed(1);

        let exp = Value::list(vec![Value::Symbol("quote".to_string()), Value::Symbol("a".to_string())]);
        let (_, node) = eval_family(
            &mut trace,
            &exp,
            &env,
            &mut scaffold,
            &mut omega_db,
            &mut gradients,
            &mut rng,
        )
        .unwrap();

        assert_eq!(
            trace.arena().value(node).unwrap(),
            Some(&Value::Symbol("a".to_string()))
        );
    }

    #[test]
    fn list_to_vec_rejects_improper_lists() {
        let improper = Value::Pair(std::rc::Rc::new(Value::Number(1.0)), std::rc::Rc::new(Value::Number(2.0)));
        assert!(list_to_vec(&improper).is_err());
    }
}
