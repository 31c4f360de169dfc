use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use venture_engine::{DirectiveId, RiplEngine};

use crate::script::{self, ScriptLine};

/// Runs a directive script against a fresh engine and writes its
/// manifest and per-step metrics to an output directory.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directive script: one `(assume ...)`/`(observe ...)`/`(predict ...)`/
    /// `(sample ...)`/`(forget ...)`/`(infer ...)` form per line.
    #[arg(long)]
    pub script: PathBuf,
    /// Output directory for the manifest, metrics, and reported values.
    #[arg(long)]
    pub out: PathBuf,
    /// Master seed for the engine's RNG stream.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;

    let text = fs::read_to_string(&args.script)?;
    let lines = script::parse(&text).map_err(|err| Box::new(err) as Box<dyn Error>)?;

    let mut engine = RiplEngine::new(args.seed);
    let mut values_csv = fs::File::create(args.out.join("values.csv"))?;
    writeln!(values_csv, "directive,kind,value")?;

    for line in lines {
        match line {
            ScriptLine::Assume { symbol, expression } => {
                let (id, value) = engine.assume(&symbol, &expression)?;
                writeln!(values_csv, "{id},assume,{value}")?;
            }
            ScriptLine::Observe { expression, value } => {
                let id = engine.observe(&expression, value)?;
                writeln!(values_csv, "{id},observe,")?;
            }
            ScriptLine::Predict { expression } => {
                let (id, value) = engine.predict(&expression)?;
                writeln!(values_csv, "{id},predict,{value}")?;
            }
            ScriptLine::Sample { expression } => {
                let value = engine.sample(&expression)?;
                writeln!(values_csv, "-,sample,{value}")?;
            }
            ScriptLine::Forget { id } => {
                engine.forget(DirectiveId(id))?;
            }
            ScriptLine::Infer { expression } => {
                engine.infer(&expression)?;
            }
        }
    }

    engine.metrics().write_csv(args.out.join("metrics.csv"))?;
    engine.manifest()?.write(&args.out.join("manifest.json"))?;

    Ok(())
}
