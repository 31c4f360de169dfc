#![deny(missing_docs)]
//! Evaluation, detach, and regen for scaffold-scoped Metropolis-Hastings
//! moves: the machinery a kernel in `venture-kernels` drives to propose,
//! score, and (if rejected) undo a change to a trace.

mod apply;
mod constrain;
mod detach;
mod eval;
mod gradients;
mod regen;

pub use apply::apply;
pub use constrain::{constrain, reconstrain, unconstrain};
pub use detach::detach_and_extract;
pub use eval::{eval_family, list_to_vec};
pub use gradients::Gradients;
pub use regen::{attach, regen, regen_and_attach};
