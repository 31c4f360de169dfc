//! Directive records: the tagged, replayable instructions a [`crate::engine::RiplEngine`]
//! accepts, exactly as enumerated in `spec.md` §6.

use serde::{Deserialize, Serialize};
use venture_core::{NodeId, Value};

/// Identifies one `assume`/`observe`/`predict` directive, stable for the
/// life of the engine so it can later be named by `forget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectiveId(pub u64);

impl std::fmt::Display for DirectiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// A directive as received from the caller, before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum Directive {
    /// Binds `symbol` to the result of evaluating `expression`.
    Assume {
        /// The name bound in the engine's top-level environment.
        symbol: String,
        /// The expression to evaluate.
        expression: Value,
    },
    /// Evaluates `expression` and constrains its result to `value`.
    Observe {
        /// The expression naming the random choice to constrain.
        expression: Value,
        /// The value it is constrained to.
        value: Value,
    },
    /// Evaluates `expression` and reports its value, keeping the family
    /// live in the trace.
    Predict {
        /// The expression to evaluate.
        expression: Value,
    },
    /// Retracts a previously issued directive.
    Forget {
        /// The directive being retracted.
        directive_id: DirectiveId,
    },
    /// Runs one or more inference transitions.
    Infer {
        /// The kernel-invocation expression, e.g. `(mh default one 10)`.
        expression: Value,
    },
}

/// What running a directive left behind: enough to support `forget` and
/// to replay a directive log deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveRecord {
    /// The directive as issued.
    pub directive: Directive,
    /// The family's terminal node, for `assume`/`observe`/`predict`.
    /// `None` for `forget` and `infer`, which do not root a family.
    pub root: Option<NodeId>,
    /// The value observed at execution time (`predict`'s reported value,
    /// `assume`'s bound value, or `observe`'s constrained value).
    pub value: Option<Value>,
    /// Whether `forget` has retracted this directive. Kept as a flag
    /// rather than removing the entry so the log replays deterministically.
    pub retracted: bool,
}
