// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains the autoencoder on a recording corpus
//   2. `predict` — reconstructs one recording from a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "ecg-autoencoder",
    version = "0.1.0",
    about = "Train a recurrent ECG beat autoencoder, then reconstruct recordings with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. Routing only.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on recordings in: {}", args.data_dir);
    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete: steps {}..={} | last loss {:.5} | best loss {:.5}",
        report.first_step, report.last_step, report.last_loss, report.best_loss
    );
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let output = args.output.clone();
    let prediction = PredictUseCase::new(args.into()).execute()?;

    let covered = prediction.beats.iter().filter(|b| b.is_some()).count();
    println!(
        "Reconstructed {}/{} beats of '{}' (step {}) → {}",
        covered,
        prediction.beats.len(),
        prediction.id,
        prediction.step,
        output.display()
    );
    Ok(())
}
