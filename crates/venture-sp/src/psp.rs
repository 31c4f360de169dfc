//! The output-PSP contract every primitive procedure must satisfy.

use venture_core::{RngHandle, Value, VentureError};

use crate::aux::SPAux;
use crate::kernel::{AAAKernel, VariationalKernel};
use crate::sp::VentureSPRecord;

/// The output-PSP contract for an application of a stochastic procedure.
///
/// Implementations must keep `simulate`/`log_density` consistent up to an
/// overall normalization constant, and must treat `incorporate`/
/// `unincorporate` as exact inverses so that repeated (un)incorporation in
/// any order leaves the aux invariant for exchangeable PSPs.
pub trait OutputPSP: std::fmt::Debug {
    /// Draws a value given operand values and the maker's aux.
    fn simulate(
        &self,
        operands: &[Value],
        aux: Option<&dyn SPAux>,
        rng: &mut RngHandle,
    ) -> Result<Value, VentureError>;

    /// Returns log p(value | operands), or `f64::NEG_INFINITY` if impossible.
    fn log_density(
        &self,
        value: &Value,
        operands: &[Value],
        aux: Option<&dyn SPAux>,
    ) -> Result<f64, VentureError>;

    /// Updates sufficient statistics to reflect `value` having been
    /// incorporated.
    fn incorporate(
        &self,
        value: &Value,
        operands: &[Value],
        aux: &mut dyn SPAux,
    ) -> Result<(), VentureError>;

    /// Inverse of `incorporate`.
    fn unincorporate(
        &self,
        value: &Value,
        operands: &[Value],
        aux: &mut dyn SPAux,
    ) -> Result<(), VentureError>;

    /// Whether this PSP is random (participates in the random-choice
    /// registry) as opposed to deterministic.
    fn is_random(&self) -> bool;

    /// Lists the finite support, when the PSP has one.
    fn enumerate_values(&self, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Option<Vec<Value>> {
        None
    }

    /// Gradient of `log_density` with respect to each operand, when defined.
    fn gradient_of_log_density(&self, _value: &Value, _operands: &[Value]) -> Option<Vec<f64>> {
        None
    }

    /// A finite upper bound on `log_density`, required by rejection MH.
    fn log_density_bound(&self, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Option<f64> {
        None
    }

    /// True when this PSP constructs a made-SP (it is a maker).
    fn is_maker(&self) -> bool {
        false
    }

    /// Constructs a fresh made-SP, for makers (`is_maker() == true`).
    /// `apply_psp` calls this instead of `simulate` for maker nodes, since
    /// the result installs directly into the trace's made-SP store rather
    /// than flowing through `Value`.
    fn simulate_made_sp(
        &self,
        _operands: &[Value],
        _aux: Option<&dyn SPAux>,
        _rng: &mut RngHandle,
    ) -> Result<VentureSPRecord, VentureError> {
        Err(VentureError::value(
            "not-a-maker",
            "this PSP does not construct a made SP",
        ))
    }

    /// The AAA kernel, when this PSP's made-SPs can be absorbed at
    /// applications.
    fn aaa_kernel(&self) -> Option<&dyn AAAKernel> {
        None
    }

    /// The variational kernel, when this PSP advertises one to the
    /// mean-field operator.
    fn variational_kernel(&self) -> Option<&dyn VariationalKernel> {
        None
    }

    /// Mutable access to the variational kernel, for the mean-field
    /// operator's gradient-ascent parameter updates between iterations.
    fn variational_kernel_mut(&mut self) -> Option<&mut dyn VariationalKernel> {
        None
    }

    /// True when this PSP's output node is a pure forward of its sole ESR
    /// parent's value (`if`'s branch node, `mem`'s cache-hit node): the
    /// output is deterministic even when the forwarded value is itself
    /// random, and `apply_psp` must copy rather than simulate it.
    fn is_esr_ref(&self) -> bool {
        false
    }
}
