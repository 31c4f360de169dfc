#![deny(missing_docs)]
//! Transition operators that resample a scaffold: single-site
//! Metropolis-Hastings, rejection sampling, mean-field variational
//! ascent, and particle Gibbs, plus the index-sampling and acceptance
//! machinery (`mix_mh`) that drives any of them against a trace's
//! scope/block structure.

mod indexer;
mod meanfield;
mod mh;
mod operator;
mod pgibbs;
mod rejection;
mod tempering;

pub use indexer::{BlockSpec, ScaffoldIndexer};
pub use meanfield::MeanfieldOperator;
pub use mh::MhOperator;
pub use operator::{mix_mh, Operator};
pub use pgibbs::PGibbsOperator;
pub use rejection::RejectionOperator;
pub use tempering::{attempt_exchange, build_ladder, exchange_acceptance, LadderConfig, LadderPolicy};
