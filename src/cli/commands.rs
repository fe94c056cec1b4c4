// ============================================================
// Layer 1 — CLI Commands
// ============================================================
// clap derive definitions for the two subcommands. The
// application layer never sees clap types: TrainArgs converts
// into TrainConfig at the boundary.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::domain::caption_record::CaptionPolicy;
use crate::ml::decoder::Activation;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the caption decoder on annotations + precomputed features
    Train(TrainArgs),

    /// Caption one image with a trained checkpoint
    Caption(CaptionArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Annotation file, one "<image>.<ext>[#n]<TAB><caption>" per line
    #[arg(long, default_value = "data/captions.txt")]
    pub captions_file: String,

    /// Second annotation file with alternate captions (e.g. lemmatised)
    #[arg(long)]
    pub alt_captions_file: Option<String>,

    /// JSON object mapping image id → backbone feature vector
    #[arg(long, default_value = "data/features.json")]
    pub features_file: String,

    /// Directory for checkpoints, configs, vocabulary and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// HuggingFace tokenizer.json (default: normalising whitespace split)
    #[arg(long)]
    pub tokenizer_json: Option<String>,

    /// Token positions per caption, including <bos> and <eos>
    #[arg(long, default_value_t = 32)]
    pub max_seq_length: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Model width; must be divisible by --n-head
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    #[arg(long, default_value_t = 8)]
    pub n_head: usize,

    /// Number of stacked decoder layers
    #[arg(long, default_value_t = 3)]
    pub num_layers: usize,

    /// Inner width of each feed-forward block
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Feed-forward activation: relu or gelu
    #[arg(long, default_value = "relu", value_parser = parse_activation)]
    pub activation: Activation,

    /// Drop tokens seen fewer times than this (they decode as <unk>)
    #[arg(long, default_value_t = 1)]
    pub min_freq: usize,

    /// first-only, all-variants or random-per-epoch
    #[arg(long, default_value = "first-only")]
    pub caption_policy: CaptionPolicy,

    /// Fraction of IMAGES used for training; the rest validate
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

fn parse_activation(s: &str) -> Result<Activation, String> {
    match s.to_ascii_lowercase().as_str() {
        "relu" => Ok(Activation::Relu),
        "gelu" => Ok(Activation::Gelu),
        other  => Err(format!("unknown activation '{other}' (expected relu or gelu)")),
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            captions_file:     a.captions_file,
            alt_captions_file: a.alt_captions_file,
            features_file:     a.features_file,
            checkpoint_dir:    a.checkpoint_dir,
            tokenizer_json:    a.tokenizer_json,
            max_seq_length:    a.max_seq_length,
            batch_size:        a.batch_size,
            epochs:            a.epochs,
            lr:                a.lr,
            d_model:           a.d_model,
            n_head:            a.n_head,
            num_layers:        a.num_layers,
            d_ff:              a.d_ff,
            dropout:           a.dropout,
            activation:        a.activation,
            min_freq:          a.min_freq,
            caption_policy:    a.caption_policy,
            train_fraction:    a.train_fraction,
            seed:              a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image identifier as it appears in the feature store
    #[arg(long)]
    pub image_id: String,

    #[arg(long, default_value = "data/features.json")]
    pub features_file: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Decode at most this many tokens (default: trained length)
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Use the epoch with the lowest validation loss, not the latest
    #[arg(long)]
    pub best: bool,
}
