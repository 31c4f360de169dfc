use venture_core::errors::ErrorInfo;
use venture_core::rng::{derive_substream_seed, RngHandle};
use venture_core::{extend_environment, lookup_symbol, root_environment, NodeId, Value, VentureError};
use rand::RngCore;

fn resolves_symbol(env: &venture_core::Environment, symbol: &str) -> Result<NodeId, VentureError> {
    lookup_symbol(env, symbol)
}

#[test]
fn environment_chain_compiles_end_to_end() {
    let root = root_environment();
    let env = extend_environment(&root, &["x".to_string()], &[NodeId::from_raw(1)]);
    assert_eq!(resolves_symbol(&env, "x").unwrap(), NodeId::from_raw(1));
}

#[test]
fn value_accessors_compose_with_error_propagation() {
    fn sum_numbers(values: &[Value]) -> Result<f64, VentureError> {
        let mut total = 0.0;
        for value in values {
            total += value.as_number()?;
        }
        Ok(total)
    }

    let values = vec![Value::Number(1.0), Value::Number(2.0)];
    assert_eq!(sum_numbers(&values).unwrap(), 3.0);
    assert!(sum_numbers(&[Value::Boolean(true)]).is_err());
}

#[test]
fn rng_handle_compiles() {
    let mut rng = RngHandle::from_seed(42);
    let _ = rng.next_u64();
    let _ = rng.uniform();
    let _ = rng.uniform_index(3);
}

#[test]
fn substream_seed_derivation_compiles() {
    let _ = derive_substream_seed(1, 0);
}

#[test]
fn error_info_formatting() {
    let info = ErrorInfo::new("E001", "problem").with_context("node", "1");
    let err = VentureError::Graph(info.clone());
    assert_eq!(err.info(), &info);
}
