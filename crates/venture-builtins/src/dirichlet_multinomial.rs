//! `dirichlet_multinomial`: the uncollapsed Dirichlet-multinomial maker.
//!
//! `(dirichlet_multinomial alpha)` draws a simplex point `theta ~
//! Dirichlet(alpha)` and returns a categorical sampler over it; every
//! draw from that sampler increments a per-category count on the
//! maker's made-SP, and the maker's AAA kernel Gibbs-resamples `theta`
//! from `Dirichlet(counts + alpha)` exactly, so a scaffold that resamples
//! `theta` and all of its draws together can absorb it at zero weight.

use std::any::Any;

use venture_core::{RngHandle, Value, VentureError};
use venture_sp::{AAAKernel, NullRequestPSP, OutputPSP, SPAux, UnitAux, VentureSPRecord, SP};

/// Builds the `dirichlet_multinomial` stochastic procedure.
pub fn sp() -> SP {
    SP::new(Box::new(NullRequestPSP), Box::new(MakerUDirMultPsp), || Box::new(UnitAux) as Box<dyn SPAux>)
}

fn alpha_and_objects(operands: &[Value]) -> Result<(Vec<f64>, Vec<Value>), VentureError> {
    let alpha: Vec<f64> = operands
        .first()
        .ok_or_else(|| VentureError::illegal_program("dirichlet-multinomial-arity", "dirichlet_multinomial needs at least an alpha vector"))?
        .as_vector()?
        .iter()
        .map(Value::as_number)
        .collect::<Result<_, _>>()?;
    let objects = match operands.get(1) {
        Some(v) => v.as_vector()?.to_vec(),
        None => (0..alpha.len()).map(|i| Value::Atom(i as i64)).collect(),
    };
    if objects.len() != alpha.len() {
        return Err(VentureError::illegal_program(
            "dirichlet-multinomial-objects",
            "the object list must have the same length as alpha",
        ));
    }
    Ok((alpha, objects))
}

/// Sufficient statistics: a running count per category.
#[derive(Debug, Clone)]
struct DirMultAux {
    counts: Vec<f64>,
}

impl DirMultAux {
    fn zeros(n: usize) -> Self {
        Self { counts: vec![0.0; n] }
    }
}

impl SPAux for DirMultAux {
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

#[derive(Debug)]
struct MakerUDirMultPsp;

impl OutputPSP for MakerUDirMultPsp {
    fn simulate(&self, _operands: &[Value], _aux: Option<&dyn SPAux>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Err(VentureError::illegal_program(
            "dirichlet-multinomial-is-a-maker",
            "dirichlet_multinomial only ever constructs a made SP",
        ))
    }

    fn log_density(&self, _value: &Value, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Result<f64, VentureError> {
        Ok(0.0)
    }

    fn incorporate(&self, _value: &Value, _operands: &[Value], _aux: &mut dyn SPAux) -> Result<(), VentureError> {
        Ok(())
    }

    fn unincorporate(&self, _value: &Value, _operands: &[Value], _aux: &mut dyn SPAux) -> Result<(), VentureError> {
        Ok(())
    }

    fn is_random(&self) -> bool {
        true
    }

    fn is_maker(&self) -> bool {
        true
    }

    fn simulate_made_sp(&self, operands: &[Value], _aux: Option<&dyn SPAux>, rng: &mut RngHandle) -> Result<VentureSPRecord, VentureError> {
        let (alpha, os) = alpha_and_objects(operands)?;
        let theta = sample_dirichlet(&alpha, rng);
        let n = alpha.len();
        let sp = SP::new(Box::new(NullRequestPSP), Box::new(UDirMultOutputPsp { theta, os }), move || {
            Box::new(DirMultAux::zeros(n)) as Box<dyn SPAux>
        });
        Ok(VentureSPRecord { sp, aux: Box::new(DirMultAux::zeros(n)) })
    }

    fn aaa_kernel(&self) -> Option<&dyn AAAKernel> {
        Some(&UDirMultAAALKernel)
    }
}

#[derive(Debug)]
struct UDirMultAAALKernel;

impl AAAKernel for UDirMultAAALKernel {
    fn simulate(&self, operands: &[Value], aux: &dyn SPAux, rng: &mut RngHandle) -> Result<VentureSPRecord, VentureError> {
        let (alpha, os) = alpha_and_objects(operands)?;
        let counts = aux
            .as_any()
            .downcast_ref::<DirMultAux>()
            .ok_or_else(|| VentureError::graph("wrong-aux-type", "dirichlet_multinomial's AAA kernel needs a DirMultAux"))?;
        let posterior: Vec<f64> = counts.counts.iter().zip(&alpha).map(|(c, a)| c + a).collect();
        let theta = sample_dirichlet(&posterior, rng);
        let n = alpha.len();
        let sp = SP::new(Box::new(NullRequestPSP), Box::new(UDirMultOutputPsp { theta, os }), move || {
            Box::new(DirMultAux::zeros(n)) as Box<dyn SPAux>
        });
        Ok(VentureSPRecord { sp, aux: aux.clone_box() })
    }
}

#[derive(Debug)]
struct UDirMultOutputPsp {
    theta: Vec<f64>,
    os: Vec<Value>,
}

impl UDirMultOutputPsp {
    fn index_of(&self, value: &Value) -> Result<usize, VentureError> {
        self.os
            .iter()
            .position(|o| o == value)
            .ok_or_else(|| VentureError::value("not-an-outcome", "value is not one of this sampler's categories"))
    }
}

impl OutputPSP for UDirMultOutputPsp {
    fn simulate(&self, _operands: &[Value], _aux: Option<&dyn SPAux>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let mut draw = rng.uniform();
        for (index, weight) in self.theta.iter().enumerate() {
            if draw < *weight || index == self.theta.len() - 1 {
                return Ok(self.os[index].clone());
            }
            draw -= weight;
        }
        unreachable!("theta sums to 1")
    }

    fn log_density(&self, value: &Value, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Result<f64, VentureError> {
        let index = self.index_of(value)?;
        Ok(self.theta[index].ln())
    }

    fn incorporate(&self, value: &Value, _operands: &[Value], aux: &mut dyn SPAux) -> Result<(), VentureError> {
        let index = self.index_of(value)?;
        let counts = aux
            .as_any_mut()
            .downcast_mut::<DirMultAux>()
            .ok_or_else(|| VentureError::graph("wrong-aux-type", "dirichlet_multinomial's draws need a DirMultAux"))?;
        counts.counts[index] += 1.0;
        Ok(())
    }

    fn unincorporate(&self, value: &Value, _operands: &[Value], aux: &mut dyn SPAux) -> Result<(), VentureError> {
        let index = self.index_of(value)?;
        let counts = aux
            .as_any_mut()
            .downcast_mut::<DirMultAux>()
            .ok_or_else(|| VentureError::graph("wrong-aux-type", "dirichlet_multinomial's draws need a DirMultAux"))?;
        counts.counts[index] -= 1.0;
        Ok(())
    }

    fn is_random(&self) -> bool {
        true
    }

    fn enumerate_values(&self, _operands: &[Value], _aux: Option<&dyn SPAux>) -> Option<Vec<Value>> {
        Some(self.os.clone())
    }
}

/// Draws `Dirichlet(alpha)` via independent `Gamma(alpha_i, 1)` draws
/// normalized to sum to one.
fn sample_dirichlet(alpha: &[f64], rng: &mut RngHandle) -> Vec<f64> {
    let draws: Vec<f64> = alpha.iter().map(|&a| sample_gamma(a, rng)).collect();
    let total: f64 = draws.iter().sum();
    draws.iter().map(|d| d / total).collect()
}

/// Marsaglia-Tsang gamma sampler, boosted by one shape unit for `shape <
/// 1` (Devroye's trick: `Gamma(a) = Gamma(a+1) * U^(1/a)`).
fn sample_gamma(shape: f64, rng: &mut RngHandle) -> f64 {
    if shape < 1.0 {
        let boosted = sample_gamma(shape + 1.0, rng);
        let u = rng.uniform().max(f64::MIN_POSITIVE);
        return boosted * u.powf(1.0 / shape);
    }
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let (x, v) = loop {
            let x = standard_normal(rng);
            let v = (1.0 + c * x).powi(3);
            if v > 0.0 {
                break (x, v);
            }
        };
        let u = rng.uniform();
        if u < 1.0 - 0.0331 * x.powi(4) {
            return d * v;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

fn standard_normal(rng: &mut RngHandle) -> f64 {
    let u1 = rng.uniform().max(f64::MIN_POSITIVE);
    let u2 = rng.uniform();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirichlet_draws_sum_to_one() {
        let mut rng = RngHandle::from_seed(7);
        let theta = sample_dirichlet(&[1.0, 2.0, 3.0], &mut rng);
        let total: f64 = theta.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(theta.len(), 3);
    }

    #[test]
    fn incorporate_and_unincorporate_cancel() {
        let psp = UDirMultOutputPsp { theta: vec![0.5, 0.5], os: vec![Value::Atom(0), Value::Atom(1)] };
        let mut aux = DirMultAux::zeros(2);
        psp.incorporate(&Value::Atom(0), &[], &mut aux).unwrap();
        assert_eq!(aux.counts, vec![1.0, 0.0]);
        psp.unincorporate(&Value::Atom(0), &[], &mut aux).unwrap();
        assert_eq!(aux.counts, vec![0.0, 0.0]);
    }
}
