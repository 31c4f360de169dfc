#![deny(missing_docs)]
//! Scaffold construction: classifies the nodes a proposal may touch into
//! resampling/absorbing/AAA/brush, and the `OmegaDB` snapshot store used
//! to detach and restore trace state around a proposal.

mod omega_db;
mod scaffold;

pub use omega_db::{EsrKey, LatentDB, OmegaDB};
pub use scaffold::{construct_scaffold, Scaffold};
