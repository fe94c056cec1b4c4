// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application).
//
//   1. `train`   — learns a decoder from captions + features
//   2. `caption` — loads a checkpoint and captions one image
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{CaptionArgs, Commands, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "image-captioner",
    version,
    about = "Train a transformer caption decoder on image features, then caption images."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Routes to the matching use case; never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Caption(args) => run_caption(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on captions in: {}", args.captions_file);
    let checkpoint_dir = args.checkpoint_dir.clone();

    let history = TrainUseCase::new(args.into()).execute()?;
    if let Some(last) = history.last() {
        println!(
            "Training complete. Final val_loss={:.4}, token_acc={:.1}%. Checkpoints in '{}'.",
            last.val_loss,
            last.token_acc * 100.0,
            checkpoint_dir
        );
    }
    Ok(())
}

fn run_caption(args: CaptionArgs) -> Result<()> {
    use crate::application::caption_use_case::CaptionUseCase;

    let use_case = CaptionUseCase::new(
        &args.checkpoint_dir,
        &args.features_file,
        args.max_len,
        args.best,
    )?;
    let caption  = use_case.caption(&args.image_id)?;
    println!("{}: {}", args.image_id, caption);
    Ok(())
}
