//! Run manifest: the master seed, the full directive log, and the final
//! trace's canonical hash, written to disk so a run can be replayed and
//! checked for determinism.
//!
//! Grounded on `asm_mcmc::manifest::RunManifest`, narrowed from an
//! ensemble-sweep record (config, code/graph hashes, checkpoint list) to
//! what a single-trace engine run produces.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use venture_core::{RunProvenance, SchemaVersion, VentureError};

use crate::directive::DirectiveRecord;

/// A complete, replayable record of one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version of this manifest's shape.
    pub schema: SchemaVersion,
    /// Provenance (seed, trace hash, timestamp, tool versions).
    pub provenance: RunProvenance,
    /// Every directive executed, in order.
    pub directive_log: Vec<DirectiveRecord>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file, creating parent directories as
    /// needed.
    pub fn write(&self, path: &Path) -> Result<(), VentureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                VentureError::Serde(venture_core::ErrorInfo::new("manifest-mkdir", err.to_string()))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("manifest-serialize", err.to_string())))?;
        fs::write(path, json)
            .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("manifest-write", err.to_string())))
    }

    /// Loads a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self, VentureError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("manifest-read", err.to_string())))?;
        serde_json::from_str(&contents)
            .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("manifest-parse", err.to_string())))
    }
}
