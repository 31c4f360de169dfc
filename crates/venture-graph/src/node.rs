//! The four node variants that make up a trace's evaluation graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use venture_core::{NodeId, Value};

/// A scope/block tag pair, as attached to an application node by
/// `scope_include` or by a request block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeTag {
    /// The scope name.
    pub scope: String,
    /// The block identifier within the scope.
    pub block: String,
}

impl ScopeTag {
    /// Creates a new scope tag.
    pub fn new(scope: impl Into<String>, block: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            block: block.into(),
        }
    }
}

/// The structural shape of a graph vertex.
///
/// Each variant names exactly the parents it depends on; `NodeArena`
/// derives `parents_of`/`children_of` from this shape rather than storing
/// edges separately, so the two can never drift apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    /// A self-evaluating or quoted literal. No parents.
    Constant,
    /// A variable lookup; its value mirrors `source`.
    Lookup {
        /// The node this lookup mirrors.
        source: NodeId,
    },
    /// The request half of a procedure application.
    ///
    /// Its value, once simulated, is a list of exposed and latent
    /// simulation requests; the request node itself only carries the
    /// structural dependency on the operator and operands.
    Request {
        /// The node whose value is the applied procedure (an `SPRef`).
        operator: NodeId,
        /// The argument nodes, in application order.
        operands: Vec<NodeId>,
    },
    /// The output half of a procedure application.
    Output {
        /// The node whose value is the applied procedure (an `SPRef`).
        operator: NodeId,
        /// The argument nodes, in application order.
        operands: Vec<NodeId>,
        /// The sibling request node produced alongside this output.
        request: NodeId,
        /// Exposed-simulation-request parents wired in as the sibling
        /// request's ESRs are evaluated.
        esr_parents: Vec<NodeId>,
        /// Scope tags present on the source expression.
        scope_tags: BTreeSet<ScopeTag>,
        /// Set when this application is constrained by an observation.
        is_observed: bool,
        /// The observed value, present iff `is_observed`.
        observed_value: Option<Value>,
        /// Whether the applied SP's output-PSP is random.
        is_random: bool,
    },
}

impl Node {
    /// Returns the structural parents of this node, in a stable order:
    /// operator, operands, request, ESR parents.
    pub fn structural_parents(&self) -> Vec<NodeId> {
        match self {
            Node::Constant => Vec::new(),
            Node::Lookup { source } => vec![*source],
            Node::Request { operator, operands } => {
                let mut parents = Vec::with_capacity(1 + operands.len());
                parents.push(*operator);
                parents.extend(operands.iter().copied());
                parents
            }
            Node::Output {
                operator,
                operands,
                request,
                esr_parents,
                ..
            } => {
                let mut parents = Vec::with_capacity(3 + operands.len() + esr_parents.len());
                parents.push(*operator);
                parents.extend(operands.iter().copied());
                parents.push(*request);
                parents.extend(esr_parents.iter().copied());
                parents
            }
        }
    }

    /// Returns true if this variant is an application (request or output).
    pub fn is_application(&self) -> bool {
        matches!(self, Node::Request { .. } | Node::Output { .. })
    }

    /// Returns whether this output node applies a random PSP, `false` for
    /// any other variant.
    pub fn is_random_output(&self) -> bool {
        matches!(self, Node::Output { is_random: true, .. })
    }

    /// Returns whether this output node is currently constrained by an
    /// observation, `false` for any other variant.
    pub fn is_observed(&self) -> bool {
        matches!(self, Node::Output { is_observed: true, .. })
    }
}
