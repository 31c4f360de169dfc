//! Optional kernels a PSP may advertise for absorbing-at-applications and
//! mean-field variational inference.

use venture_core::{RngHandle, Value, VentureError};

use crate::aux::SPAux;
use crate::sp::VentureSPRecord;

/// A closed-form resampler for a maker whose made-SP's descendants span
/// the whole scaffold ("absorbed at applications").
///
/// Its weight contribution to the Metropolis-Hastings ratio is always
/// zero; the conditional it samples from is exact given the aux.
pub trait AAAKernel: std::fmt::Debug {
    /// Samples a fresh made-SP from the exact conditional given the
    /// maker's own operands (e.g. a Dirichlet prior's pseudocounts) and
    /// the aux accumulated by every application of the made-SP it
    /// replaces.
    fn simulate(&self, operands: &[Value], aux: &dyn SPAux, rng: &mut RngHandle) -> Result<VentureSPRecord, VentureError>;
}

/// A parametric proposal a PSP offers to the mean-field operator.
///
/// The operator treats `parameters`/`set_parameters` as an opaque vector
/// it nudges via stochastic gradient ascent; `log_density`'s gradient
/// with respect to the parameters drives each ascent step.
pub trait VariationalKernel: std::fmt::Debug {
    /// Returns the current parameter vector.
    fn parameters(&self) -> Vec<f64>;

    /// Overwrites the parameter vector.
    fn set_parameters(&mut self, parameters: &[f64]);

    /// Draws a value from the current variational distribution.
    fn simulate(&self, rng: &mut RngHandle) -> Result<Value, VentureError>;

    /// log q(value | current parameters).
    fn log_density(&self, value: &Value) -> f64;

    /// Gradient of `log_density(value)` with respect to the parameters.
    fn gradient_of_log_density(&self, value: &Value) -> Vec<f64>;
}
