use venture_core::errors::ErrorInfo;
use venture_core::VentureError;

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("id", "1")
        .with_context("reason", "example")
}

#[test]
fn graph_error_surface() {
    let err = VentureError::Graph(sample_info("G001", "node not isolated"));
    assert_eq!(err.info().code, "G001");
    assert!(err.info().context.contains_key("id"));
}

#[test]
fn value_error_surface() {
    let err = VentureError::Value(sample_info("V001", "concentration non-positive"));
    assert_eq!(err.info().code, "V001");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn unbound_symbol_surface() {
    let err = VentureError::unbound_symbol("x");
    assert_eq!(err.info().code, "unbound-symbol");
    assert_eq!(err.info().context.get("symbol").unwrap(), "x");
}

#[test]
fn illegal_program_surface() {
    let err = VentureError::illegal_program("P001", "constrained past a requesting SP");
    assert_eq!(err.info().code, "P001");
}

#[test]
fn inference_error_surface() {
    let err = VentureError::inference("I001", "log density bound missing");
    assert_eq!(err.info().code, "I001");
}

#[test]
fn serde_error_surface() {
    let err = VentureError::Serde(sample_info("S001", "schema mismatch"));
    assert_eq!(err.info().code, "S001");
}
