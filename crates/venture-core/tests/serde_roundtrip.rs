use std::rc::Rc;

use venture_core::provenance::{RunProvenance, SchemaVersion};
use venture_core::{NodeId, Value};

#[test]
fn provenance_round_trips_json() {
    let provenance = RunProvenance {
        trace_hash: "deadbeef".into(),
        seed: 99,
        seed_label: Some("master".into()),
        created_at: "2023-10-31T00:00:00Z".into(),
        tool_versions: [("venture-core".into(), "0.1.0".into())].into_iter().collect(),
    };

    let json = serde_json::to_string_pretty(&provenance).expect("serialize");
    let decoded: RunProvenance = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(decoded, provenance);
    assert_eq!(decoded.trace_hash, "deadbeef");
}

#[test]
fn schema_version_round_trips_json() {
    let version = SchemaVersion::new(1, 2, 3);
    let json = serde_json::to_string(&version).expect("serialize");
    let decoded: SchemaVersion = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, version);
}

#[test]
fn compound_value_round_trips_json() {
    let list = Value::list(vec![
        Value::Number(1.0),
        Value::Boolean(true),
        Value::Symbol("x".into()),
        Value::SPRef(NodeId::from_raw(7)),
    ]);

    let json = serde_json::to_string(&list).expect("serialize");
    let decoded: Value = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(decoded, list);
}

#[test]
fn simplex_and_matrix_round_trip_json() {
    let simplex = Value::Simplex(Rc::new(vec![0.2, 0.3, 0.5]));
    let matrix = Value::Matrix {
        rows: 2,
        cols: 2,
        data: Rc::new(vec![1.0, 0.0, 0.0, 1.0]),
    };

    for value in [simplex, matrix] {
        let json = serde_json::to_string(&value).expect("serialize");
        let decoded: Value = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, value);
    }
}
