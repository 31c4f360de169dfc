//! Structured error types shared across Venture crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`VentureError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (node ids, symbols, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for the Venture inference engine.
///
/// Variants follow the error kinds enumerated by the engine's error
/// handling design: value errors from a primitive rejecting its arguments,
/// unbound symbols from environment lookup, illegal-program structural
/// violations (e.g. constraining past a non-identity random descendant),
/// inference errors from ill-defined acceptance math, and graph-level
/// errors from the node arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum VentureError {
    /// A primitive rejected its arguments.
    #[error("value error: {0}")]
    Value(ErrorInfo),
    /// `findSymbol` walked off the top of the environment chain.
    #[error("unbound symbol: {0}")]
    UnboundSymbol(ErrorInfo),
    /// A structural rule of the trace was violated.
    #[error("illegal program: {0}")]
    IllegalProgram(ErrorInfo),
    /// A kernel's acceptance math became ill-defined.
    #[error("inference error: {0}")]
    Inference(ErrorInfo),
    /// Node arena / hypergraph structural errors.
    #[error("graph error: {0}")]
    Graph(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl VentureError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            VentureError::Value(info)
            | VentureError::UnboundSymbol(info)
            | VentureError::IllegalProgram(info)
            | VentureError::Inference(info)
            | VentureError::Graph(info)
            | VentureError::Serde(info) => info,
        }
    }

    /// Convenience constructor for [`VentureError::Value`].
    pub fn value(code: impl Into<String>, message: impl Into<String>) -> Self {
        VentureError::Value(ErrorInfo::new(code, message))
    }

    /// Convenience constructor for [`VentureError::UnboundSymbol`].
    pub fn unbound_symbol(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        VentureError::UnboundSymbol(
            ErrorInfo::new("unbound-symbol", format!("symbol not bound: {symbol}"))
                .with_context("symbol", symbol),
        )
    }

    /// Convenience constructor for [`VentureError::IllegalProgram`].
    pub fn illegal_program(code: impl Into<String>, message: impl Into<String>) -> Self {
        VentureError::IllegalProgram(ErrorInfo::new(code, message))
    }

    /// Convenience constructor for [`VentureError::Inference`].
    pub fn inference(code: impl Into<String>, message: impl Into<String>) -> Self {
        VentureError::Inference(ErrorInfo::new(code, message))
    }

    /// Convenience constructor for [`VentureError::Graph`].
    pub fn graph(code: impl Into<String>, message: impl Into<String>) -> Self {
        VentureError::Graph(ErrorInfo::new(code, message))
    }
}
