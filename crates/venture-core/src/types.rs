//! The Venture value model and the persistent lexical environment.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::errors::VentureError;
use crate::NodeId;

/// The sum type of runtime values flowing through a trace.
///
/// Values are immutable; ownership of compound values is shared by
/// reference (`Rc`) rather than deep-cloned, matching the "values are
/// immutable, ownership is shared by reference" invariant of the data
/// model. Equality is structural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A real number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
    /// A tagged integer used as a discrete label (die faces, categories).
    Atom(i64),
    /// A symbol, e.g. a variable name appearing in quoted data.
    Symbol(String),
    /// The empty list.
    Nil,
    /// A cons pair.
    Pair(Rc<Value>, Rc<Value>),
    /// A fixed-size vector of values.
    Vector(Rc<Vec<Value>>),
    /// A point on the probability simplex.
    Simplex(Rc<Vec<f64>>),
    /// A dense row-major matrix.
    Matrix {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
        /// Row-major entries, length `rows * cols`.
        data: Rc<Vec<f64>>,
    },
    /// A reference to a maker node whose made-SP implements a procedure.
    ///
    /// This is a tagged variant rather than a shared-ownership pointer: the
    /// SPRef names the maker node by id, and the trace resolves it. No
    /// cycle can arise because the node graph itself is acyclic.
    SPRef(NodeId),
}

impl Value {
    /// Returns the numeric value or a [`VentureError::Value`] on mismatch.
    pub fn as_number(&self) -> Result<f64, VentureError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(type_error("number", other)),
        }
    }

    /// Returns the boolean value or a [`VentureError::Value`] on mismatch.
    pub fn as_boolean(&self) -> Result<bool, VentureError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(type_error("boolean", other)),
        }
    }

    /// Returns the atom value or a [`VentureError::Value`] on mismatch.
    pub fn as_atom(&self) -> Result<i64, VentureError> {
        match self {
            Value::Atom(a) => Ok(*a),
            other => Err(type_error("atom", other)),
        }
    }

    /// Returns the symbol text or a [`VentureError::Value`] on mismatch.
    pub fn as_symbol(&self) -> Result<&str, VentureError> {
        match self {
            Value::Symbol(s) => Ok(s.as_str()),
            other => Err(type_error("symbol", other)),
        }
    }

    /// Returns the simplex coordinates or a [`VentureError::Value`] on mismatch.
    pub fn as_simplex(&self) -> Result<&[f64], VentureError> {
        match self {
            Value::Simplex(s) => Ok(s.as_slice()),
            other => Err(type_error("simplex", other)),
        }
    }

    /// Returns the vector contents or a [`VentureError::Value`] on mismatch.
    pub fn as_vector(&self) -> Result<&[Value], VentureError> {
        match self {
            Value::Vector(v) => Ok(v.as_slice()),
            other => Err(type_error("vector", other)),
        }
    }

    /// Returns the maker node id or a [`VentureError::Value`] on mismatch.
    pub fn as_sp_ref(&self) -> Result<NodeId, VentureError> {
        match self {
            Value::SPRef(id) => Ok(*id),
            other => Err(type_error("sp-ref", other)),
        }
    }

    /// Builds a proper list from the given elements.
    pub fn list(items: Vec<Value>) -> Value {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, head| Value::Pair(Rc::new(head), Rc::new(tail)))
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Atom(_) => "atom",
            Value::Symbol(_) => "symbol",
            Value::Nil | Value::Pair(_, _) => "list",
            Value::Vector(_) => "vector",
            Value::Simplex(_) => "simplex",
            Value::Matrix { .. } => "matrix",
            Value::SPRef(_) => "sp-ref",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Atom(a) => write!(f, "atom<{a}>"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Nil => write!(f, "()"),
            Value::Pair(a, b) => write!(f, "({a} . {b})"),
            Value::Vector(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Simplex(s) => write!(f, "simplex{s:?}"),
            Value::Matrix { rows, cols, .. } => write!(f, "matrix[{rows}x{cols}]"),
            Value::SPRef(id) => write!(f, "<sp:{}>", id.as_raw()),
        }
    }
}

fn type_error(expected: &str, actual: &Value) -> VentureError {
    VentureError::value(
        "type-mismatch",
        format!("expected a {expected} value, found a {}", actual.kind()),
    )
}

/// One frame of a persistent, chained lexical environment.
///
/// Extending an environment never mutates the parent: `extend` builds a new
/// frame pointing at the existing one, so environments form a tree that may
/// be shared freely between closures captured at different points in
/// evaluation.
#[derive(Debug, Clone)]
pub struct EnvFrame {
    bindings: BTreeMap<String, NodeId>,
    parent: Option<Environment>,
}

/// A reference-counted handle to an [`EnvFrame`].
pub type Environment = Rc<EnvFrame>;

/// Creates the empty root environment.
pub fn root_environment() -> Environment {
    Rc::new(EnvFrame {
        bindings: BTreeMap::new(),
        parent: None,
    })
}

/// Extends `parent` with a new frame binding `symbols` to `nodes` pairwise.
///
/// Panics if `symbols` and `nodes` have different lengths; this is a
/// programmer error at every call site (the caller always builds both lists
/// together from a lambda's parameter list and its argument nodes).
pub fn extend_environment(parent: &Environment, symbols: &[String], nodes: &[NodeId]) -> Environment {
    assert_eq!(symbols.len(), nodes.len());
    let mut bindings = BTreeMap::new();
    for (symbol, node) in symbols.iter().zip(nodes.iter()) {
        bindings.insert(symbol.clone(), *node);
    }
    Rc::new(EnvFrame {
        bindings,
        parent: Some(Rc::clone(parent)),
    })
}

/// Looks up `symbol` by walking the environment chain from `env` upward.
pub fn lookup_symbol(env: &Environment, symbol: &str) -> Result<NodeId, VentureError> {
    let mut frame = env;
    loop {
        if let Some(node) = frame.bindings.get(symbol) {
            return Ok(*node);
        }
        match &frame.parent {
            Some(parent) => frame = parent,
            None => return Err(VentureError::unbound_symbol(symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let root = root_environment();
        let child = extend_environment(&root, &["x".to_string()], &[node(1)]);
        let grandchild = extend_environment(&child, &["y".to_string()], &[node(2)]);

        assert_eq!(lookup_symbol(&grandchild, "x").unwrap(), node(1));
        assert_eq!(lookup_symbol(&grandchild, "y").unwrap(), node(2));
    }

    #[test]
    fn lookup_fails_past_root() {
        let root = root_environment();
        let err = lookup_symbol(&root, "z").unwrap_err();
        assert!(matches!(err, VentureError::UnboundSymbol(_)));
    }

    #[test]
    fn extending_never_mutates_parent() {
        let root = root_environment();
        let child = extend_environment(&root, &["x".to_string()], &[node(1)]);
        assert!(lookup_symbol(&root, "x").is_err());
        assert!(lookup_symbol(&child, "x").is_ok());
    }

    #[test]
    fn value_type_accessors_reject_mismatches() {
        let v = Value::Number(1.0);
        assert!(v.as_boolean().is_err());
        assert_eq!(v.as_number().unwrap(), 1.0);
    }
}
