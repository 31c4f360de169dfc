//! The stochastic-procedure record: a request/output PSP pair plus an
//! aux factory.

use crate::aux::SPAux;
use crate::psp::OutputPSP;
use crate::request::RequestPSP;

/// A stochastic procedure: the pairing of a request-PSP and an
/// output-PSP, plus a factory for fresh auxiliary statistics.
pub struct SP {
    /// Computes exposed/latent sub-requests for an application.
    pub request_psp: Box<dyn RequestPSP>,
    /// Simulates, scores, and (un)incorporates values.
    pub output_psp: Box<dyn OutputPSP>,
    aux_factory: Box<dyn Fn() -> Box<dyn SPAux>>,
}

impl SP {
    /// Builds an SP from its two PSPs and an aux factory.
    pub fn new(
        request_psp: Box<dyn RequestPSP>,
        output_psp: Box<dyn OutputPSP>,
        aux_factory: impl Fn() -> Box<dyn SPAux> + 'static,
    ) -> Self {
        Self {
            request_psp,
            output_psp,
            aux_factory: Box::new(aux_factory),
        }
    }

    /// Constructs a fresh, empty aux for a node that applies this SP.
    pub fn construct_aux(&self) -> Box<dyn SPAux> {
        (self.aux_factory)()
    }
}

impl std::fmt::Debug for SP {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SP")
            .field("request_psp", &self.request_psp)
            .field("output_psp", &self.output_psp)
            .finish_non_exhaustive()
    }
}

/// The result of simulating a maker-PSP: a fresh made-SP plus its
/// initial (empty) aux.
#[derive(Debug)]
pub struct VentureSPRecord {
    /// The newly constructed procedure.
    pub sp: SP,
    /// Its initial sufficient statistics.
    pub aux: Box<dyn SPAux>,
}
