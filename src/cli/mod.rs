// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains a digit classifier on the idx files
//   2. `eval`  — loads a checkpoint and reports test accuracy
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "prunenet",
    version = "0.1.0",
    about = "Train small dense and convolutional digit classifiers with pruning masks."
)]
pub struct Cli {
    /// The subcommand to run (train or eval)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => Self::run_train(args),
            Commands::Eval(args) => Self::run_eval(args),
        }
    }

    /// Handles the `train` subcommand.
    /// Converts CLI args into a TrainConfig and hands off to Layer 2.
    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::{TrainConfig, TrainUseCase};

        tracing::info!("Starting training on digit data in: {}", args.data_dir);

        // Convert CLI args → application config. Fallible: the model
        // preset and algorithm selector are validated here.
        let config = TrainConfig::try_from(args)?;
        let use_case = TrainUseCase::new(config);
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    /// Handles the `eval` subcommand.
    /// Loads the network from checkpoint and prints test accuracy.
    fn run_eval(args: EvalArgs) -> Result<()> {
        use crate::application::eval_use_case::EvalUseCase;

        let use_case = EvalUseCase::new(args.checkpoint_dir.clone(), args.data_dir.clone())?;
        let accuracy = use_case.accuracy()?;
        println!("\nTest accuracy: {:.2}%", accuracy * 100.0);
        Ok(())
    }
}
