use std::error::Error;

use clap::{Parser, Subcommand};
use commands::run::{self, RunArgs};

mod commands;
mod script;

#[derive(Parser, Debug)]
#[command(name = "venture-sim", about = "Venture inference engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a directive script against a fresh engine.
    Run(RunArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
    }
}
