// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All workflow logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train-pass` - one DataLoader pass over the training split
//   2. `eval-pass`  - query view + context view pass over an
//                     evaluation split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalPassArgs, TrainPassArgs};

use crate::application::eval_pass::EvalPass;
use crate::application::train_pass::TrainPass;

/// The main CLI struct. clap generates the parsing code from it.
#[derive(Parser, Debug)]
#[command(
    name = "moment-data",
    version,
    about = "Assemble moment-retrieval batches from precomputed feature stores."
)]
pub struct Cli {
    /// The subcommand to run (train-pass or eval-pass)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::TrainPass(args) => run_train_pass(args),
            Commands::EvalPass(args)  => run_eval_pass(args),
        }
    }
}

fn run_train_pass(args: TrainPassArgs) -> Result<()> {
    tracing::info!("Starting training pass over: {}", args.train_path.display());

    let summary = TrainPass::new(args.into()).execute()?;

    println!(
        "Training pass on '{}' ({}): {} records",
        summary.dset_name, summary.backend, summary.records
    );
    println!("  train: {}", summary.stats);
    Ok(())
}

fn run_eval_pass(args: EvalPassArgs) -> Result<()> {
    tracing::info!("Starting evaluation pass over split '{}'", args.split);

    let summary = EvalPass::new(args.into()).execute()?;

    println!(
        "Evaluation pass on '{}' split '{}' ({}): {} queries x {} videos = {} ranking pairs",
        summary.dset_name,
        summary.split,
        summary.backend,
        summary.num_queries,
        summary.num_videos,
        summary.ranking_pairs()
    );
    println!("  query:   {}", summary.query);
    println!("  context: {}", summary.context);
    Ok(())
}
