//! Per-`infer`-step sample log and acceptance-rate summary.
//!
//! Grounded on `asm_mcmc::metrics`'s `MetricSample`/`MetricsRecorder`: a
//! flat per-step sample vector plus a derived coverage summary, with the
//! same `write_csv` shape, narrowed from the teacher's
//! energy-breakdown/replica-ladder fields to what a single-trace kernel
//! step actually produces.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// One transition step's outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    /// Step index within the `infer` call, 0-based.
    pub step: usize,
    /// Label of the kernel that proposed this step (`"mh"`, `"pgibbs"`, ...).
    pub kernel: String,
    /// Whether the proposal was accepted.
    pub accepted: bool,
    /// The Metropolis-Hastings log acceptance ratio computed for the step.
    pub log_alpha: f64,
    /// Canonical hash of the trace after the step.
    pub trace_hash: String,
}

/// Aggregate acceptance/coverage summary over a recorded run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageSummary {
    /// Fraction of steps accepted.
    pub acceptance_rate: f64,
    /// Number of distinct trace hashes visited.
    pub unique_trace_hashes: usize,
}

impl CoverageSummary {
    /// The summary of an empty recorder.
    pub fn empty() -> Self {
        Self {
            acceptance_rate: 0.0,
            unique_trace_hashes: 0,
        }
    }
}

/// Collects per-step samples across one or more `infer` calls.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<MetricSample>,
    unique_hashes: IndexSet<String>,
}

impl MetricsRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one step's outcome.
    pub fn push_sample(&mut self, sample: MetricSample) {
        self.unique_hashes.insert(sample.trace_hash.clone());
        self.samples.push(sample);
    }

    /// Returns every sample recorded so far.
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Computes the acceptance-rate/coverage summary.
    pub fn summary(&self) -> CoverageSummary {
        if self.samples.is_empty() {
            return CoverageSummary::empty();
        }
        let accepted = self.samples.iter().filter(|s| s.accepted).count();
        CoverageSummary {
            acceptance_rate: accepted as f64 / self.samples.len() as f64,
            unique_trace_hashes: self.unique_hashes.len(),
        }
    }

    /// Writes the recorded samples to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "step,kernel,accepted,log_alpha,trace_hash")?;
        for sample in &self.samples {
            writeln!(
                file,
                "{},{},{},{:.6},{}",
                sample.step, sample.kernel, sample.accepted, sample.log_alpha, sample.trace_hash
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reports_acceptance_rate_and_unique_hashes() {
        let mut recorder = MetricsRecorder::new();
        recorder.push_sample(MetricSample {
            step: 0,
            kernel: "mh".to_string(),
            accepted: true,
            log_alpha: 0.1,
            trace_hash: "a".to_string(),
        });
        recorder.push_sample(MetricSample {
            step: 1,
            kernel: "mh".to_string(),
            accepted: false,
            log_alpha: -1.0,
            trace_hash: "a".to_string(),
        });

        let summary = recorder.summary();
        assert_eq!(summary.acceptance_rate, 0.5);
        assert_eq!(summary.unique_trace_hashes, 1);
    }
}
