//! The gradient accumulator threaded through eval/regen for the mean-field
//! operator's ascent step.

use std::collections::HashMap;

use venture_core::NodeId;

/// Per-node gradient of the variational log-density with respect to each
/// variational node's own parameters, accumulated as `regen_and_attach`
/// walks a scaffold marked for mean-field treatment.
pub type Gradients = HashMap<NodeId, Vec<f64>>;
