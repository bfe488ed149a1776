// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All real work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`     - trains a model on a parallel corpus
//   2. `translate` - loads a trained model and translates a sentence
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TrainArgs, TranslateArgs};

use crate::application::{
    train_use_case::{TrainConfig, TrainUseCase},
    translate_use_case::TranslateUseCase,
};

/// The main CLI struct. clap reads the fields and generates
/// argument parsing code via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "nmt",
    version,
    about = "Train an attention-based seq2seq translation model, then translate sentences."
)]
pub struct Cli {
    /// The subcommand to run (train or translate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Translate(args) => run_translate(args),
        }
    }
}

/// Handles the `train` subcommand.
fn run_train(args: TrainArgs) -> Result<()> {
    let config = match args.config.clone() {
        Some(path) => {
            tracing::info!("Reading training config from '{}'", path);
            TrainConfig::from_json_file(&path)?
        }
        None => TrainConfig::from(args),
    };

    let outcome = TrainUseCase::new(config.clone()).execute()?;

    println!(
        "Training complete: {} epochs, {} updates. Model saved to '{}'.",
        outcome.summary.epochs, outcome.summary.updates, config.model_dir
    );
    for (source, translation) in &outcome.samples {
        println!("  {source}  =>  {translation}");
    }
    Ok(())
}

/// Handles the `translate` subcommand.
fn run_translate(args: TranslateArgs) -> Result<()> {
    let use_case    = TranslateUseCase::new(&args.model_dir, (&args).into())?;
    let translation = use_case.translate(&args.sentence)?;

    println!("{}", translation.tokens.join(" "));
    if let Some(scores) = &translation.token_scores {
        // scores[i] belongs to tokens[i + 1]; <s> is given, not predicted
        for (token, score) in translation.tokens.iter().skip(1).zip(scores) {
            println!("  {token:<16} {score:>9.4}");
        }
        println!("  total            {:>9.4}", translation.score);
    }
    Ok(())
}
