//! Sufficient-statistics storage owned by maker nodes.

use std::any::Any;
use std::fmt::Debug;

/// Per-SP auxiliary statistics (e.g. Dirichlet-multinomial pseudocounts).
///
/// Every made-SP owns exactly one `SPAux`; `incorporate`/`unincorporate`
/// mutate it and it is snapshotted wholesale into an `OmegaDB` entry
/// during detach. Downcasting through `Any` lets each PSP recover its own
/// concrete statistics type without the trait itself being generic.
pub trait SPAux: Debug {
    /// Returns this aux as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Returns this aux as `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Produces an independent copy of this aux, used when `OmegaDB`
    /// snapshots a maker node's statistics during detach.
    fn clone_box(&self) -> Box<dyn SPAux>;
}

/// The aux used by non-statistical SPs (e.g. deterministic arithmetic).
#[derive(Debug, Clone, Default)]
pub struct UnitAux;

impl SPAux for UnitAux {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn SPAux> {
        Box::new(self.clone())
    }
}
