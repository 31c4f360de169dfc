//! Replica/tempering ladder helpers.
//!
//! `venture-engine::infer` drives a single trace through a single kernel
//! set; nothing here tempers that trace in place. What `venture-sim` runs
//! instead is an *ensemble* of independently-seeded chains sharing the
//! same program and kernel schedule, each at its own temperature, purely
//! for convergence diagnostics (effective acceptance rate across
//! replicas, not a shared-state parallel-tempering sampler). The ladder
//! construction and exchange-acceptance math are ported from the
//! teacher's `asm-mcmc::tempering` module.

use serde::{Deserialize, Serialize};

use venture_core::RngHandle;

/// Replica ladder construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Number of replicas in the ladder.
    #[serde(default = "default_replicas")]
    pub replicas: usize,
    /// Base temperature used for the coldest replica.
    #[serde(default = "default_base_temperature")]
    pub base_temperature: f64,
    /// Policy used to generate higher temperatures.
    #[serde(default)]
    pub policy: LadderPolicy,
}

fn default_replicas() -> usize {
    1
}

fn default_base_temperature() -> f64 {
    1.0
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            base_temperature: default_base_temperature(),
            policy: LadderPolicy::default(),
        }
    }
}

/// Supported ladder construction strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LadderPolicy {
    /// Geometric progression with a fixed ratio between neighbouring replicas.
    Geometric {
        /// Multiplicative spacing ratio between adjacent replicas.
        #[serde(default = "default_ratio")]
        ratio: f64,
    },
    /// Explicit list of temperatures supplied by the caller.
    Manual {
        /// Ordered list of temperatures assigned to replicas.
        temperatures: Vec<f64>,
    },
}

fn default_ratio() -> f64 {
    1.5
}

impl Default for LadderPolicy {
    fn default() -> Self {
        LadderPolicy::Geometric { ratio: default_ratio() }
    }
}

/// Builds a deterministic temperature ladder following the configured
/// policy, coldest replica first.
pub fn build_ladder(config: &LadderConfig) -> Vec<f64> {
    match &config.policy {
        LadderPolicy::Geometric { ratio } => {
            let ratio = ratio.max(1.0);
            let mut ladder = Vec::with_capacity(config.replicas.max(1));
            let mut temp = config.base_temperature;
            for _ in 0..config.replicas.max(1) {
                ladder.push(temp.max(1e-6));
                temp *= ratio;
            }
            ladder
        }
        LadderPolicy::Manual { temperatures } => {
            if temperatures.is_empty() {
                vec![config.base_temperature]
            } else {
                temperatures.clone()
            }
        }
    }
}

/// Computes the Metropolis acceptance probability for exchanging two
/// replicas' states, given their joint log-densities and temperatures.
pub fn exchange_acceptance(log_density_a: f64, temp_a: f64, log_density_b: f64, temp_b: f64) -> f64 {
    let beta_a = 1.0 / temp_a.max(1e-9);
    let beta_b = 1.0 / temp_b.max(1e-9);
    let delta = (beta_b - beta_a) * (log_density_a - log_density_b);
    delta.exp().min(1.0)
}

/// Draws an exchange attempt, returning whether it was accepted and the
/// acceptance probability it was drawn against.
pub fn attempt_exchange(
    log_density_a: f64,
    temp_a: f64,
    log_density_b: f64,
    temp_b: f64,
    rng: &mut RngHandle,
) -> (bool, f64) {
    let acceptance = exchange_acceptance(log_density_a, temp_a, log_density_b, temp_b);
    (rng.uniform() < acceptance, acceptance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometric_ladder_is_increasing_and_starts_at_base() {
        let config = LadderConfig {
            replicas: 4,
            base_temperature: 1.0,
            policy: LadderPolicy::Geometric { ratio: 2.0 },
        };
        let ladder = build_ladder(&config);
        assert_eq!(ladder, vec![1.0, 2.0, 4.0, 8.0]);
    }

    #[test]
    fn identical_replicas_always_exchange() {
        let acceptance = exchange_acceptance(-3.0, 1.0, -3.0, 1.0);
        assert!((acceptance - 1.0).abs() < 1e-12);
    }
}
