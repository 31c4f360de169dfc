//! Exposed and latent simulation requests produced by a request-PSP.

use venture_core::{Environment, NodeId, Value, VentureError};

/// An exposed simulation request: a sub-expression whose evaluation
/// becomes a trace node, wired in as an ESR parent of the requesting
/// output node.
#[derive(Debug, Clone)]
pub struct Esr {
    /// Identifies this request among the ones issued by the same call,
    /// used to find or create the corresponding family on re-request.
    pub key: String,
    /// The expression to evaluate.
    pub expression: Value,
    /// The environment the expression should be evaluated in.
    pub environment: Environment,
    /// Where to look up/register the family for `key`: `None` scopes it to
    /// the requesting call site (the usual case — an `if` rebuilding its
    /// chosen branch each time it runs); `Some(maker)` scopes it to a
    /// maker node instead, so every application of that made-SP shares
    /// the same family for a given key (`mem`'s cache).
    pub shared_scope: Option<NodeId>,
}

impl Esr {
    /// Creates a new exposed simulation request, scoped to the requesting
    /// call site.
    pub fn new(key: impl Into<String>, expression: Value, environment: Environment) -> Self {
        Self {
            key: key.into(),
            expression,
            environment,
            shared_scope: None,
        }
    }

    /// Creates a new exposed simulation request shared across every
    /// application that requests the same `key` under `scope`.
    pub fn shared(key: impl Into<String>, expression: Value, environment: Environment, scope: NodeId) -> Self {
        Self {
            key: key.into(),
            expression,
            environment,
            shared_scope: Some(scope),
        }
    }
}

/// A latent simulation request: its result is hidden in an SP-owned
/// latent DB rather than becoming a trace node.
#[derive(Debug, Clone)]
pub struct Lsr {
    /// Identifies this request within the SP's latent DB.
    pub key: String,
    /// SP-specific payload describing what should be simulated.
    pub payload: Value,
}

impl Lsr {
    /// Creates a new latent simulation request.
    pub fn new(key: impl Into<String>, payload: Value) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// The result of a request-PSP's `simulate_requests`.
#[derive(Debug, Clone, Default)]
pub struct RequestRecord {
    /// Exposed simulation requests, each becoming a trace sub-family.
    pub esrs: Vec<Esr>,
    /// Latent simulation requests, handled entirely by the SP.
    pub lsrs: Vec<Lsr>,
}

/// Applies a maker-SP or ordinary SP's request-PSP.
pub trait RequestPSP: std::fmt::Debug {
    /// Computes the exposed and latent requests for the given operands.
    ///
    /// `maker` is the node this application resolved its operator's
    /// `SPRef` to — the made-SP's own identity, shared by every
    /// application of it. Most request-PSPs ignore it; a memoizing one
    /// uses it to scope its cache to "this made-SP", shared across every
    /// call site that applies it.
    fn simulate_requests(
        &self,
        operands: &[Value],
        environment: &Environment,
        maker: NodeId,
    ) -> Result<RequestRecord, VentureError>;
}

/// The request-PSP of an ordinary (non-higher-order) procedure: it makes
/// no sub-requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRequestPSP;

impl RequestPSP for NullRequestPSP {
    fn simulate_requests(
        &self,
        _operands: &[Value],
        _environment: &Environment,
        _maker: NodeId,
    ) -> Result<RequestRecord, VentureError> {
        Ok(RequestRecord::default())
    }
}
