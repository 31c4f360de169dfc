#![deny(missing_docs)]
//! The stochastic-procedure (SP) / PSP contract: the interface every
//! primitive distribution or higher-order procedure implements to
//! participate in a Venture trace.

mod aux;
mod kernel;
mod psp;
mod request;
mod sp;

pub use aux::{SPAux, UnitAux};
pub use kernel::{AAAKernel, VariationalKernel};
pub use psp::OutputPSP;
pub use request::{Esr, Lsr, NullRequestPSP, RequestPSP, RequestRecord};
pub use sp::{VentureSPRecord, SP};
