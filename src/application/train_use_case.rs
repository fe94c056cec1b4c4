// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Read + join annotation files  (Layer 4 - data)
//   Step 2: Pick the tokenizer            (Layer 4 - data)
//   Step 3: Build + save vocabulary       (Layer 4 / 6)
//   Step 4: Load backbone features        (Layer 6 - infra)
//   Step 5: Split train/validation        (Layer 4 - data)
//   Step 6: Build cached datasets         (Layer 4 - data)
//   Step 7: Save configs                  (Layer 6 - infra)
//   Step 8: Run training loop             (Layer 5 - ml)
//
// The vocabulary is built over the WHOLE corpus before the
// split, so validation captions encode with the same ids.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::BufReader,
    path::Path,
};

use crate::data::{
    corpus::{corpus_texts, join_annotation_streams},
    dataset::CaptionDataset,
    sequence::SequenceEncoder,
    splitter::split_records,
    tokenizer::{HfTokenizer, WhitespaceTokenizer},
    vocabulary::VocabularyBuilder,
};
use crate::domain::{
    caption_record::CaptionPolicy,
    traits::{FeatureExtractor, Tokenize},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    feature_store::PrecomputedFeatures,
    metrics::EpochMetrics,
    vocab_store::VocabStore,
};
use crate::ml::{decoder::Activation, model::CaptioningModelConfig, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Saved next to the checkpoints
// so the run can be inspected and reproduced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub captions_file:     String,
    /// Optional second stream of captions (e.g. lemmatised)
    pub alt_captions_file: Option<String>,
    /// JSON object of precomputed backbone features
    pub features_file:     String,
    pub checkpoint_dir:    String,
    /// HuggingFace tokenizer.json; whitespace tokenizer when absent
    pub tokenizer_json:    Option<String>,
    pub max_seq_length:    usize,
    pub batch_size:        usize,
    pub epochs:            usize,
    pub lr:                f64,
    pub d_model:           usize,
    pub n_head:            usize,
    pub num_layers:        usize,
    pub d_ff:              usize,
    pub dropout:           f64,
    pub activation:        Activation,
    pub min_freq:          usize,
    pub caption_policy:    CaptionPolicy,
    pub train_fraction:    f64,
    pub seed:              u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            captions_file:     "data/captions.txt".to_string(),
            alt_captions_file: None,
            features_file:     "data/features.json".to_string(),
            checkpoint_dir:    "checkpoints".to_string(),
            tokenizer_json:    None,
            max_seq_length:    32,
            batch_size:        32,
            epochs:            10,
            lr:                1e-4,
            d_model:           256,
            n_head:            8,
            num_layers:        3,
            d_ff:              1024,
            dropout:           0.1,
            activation:        Activation::Relu,
            min_freq:          1,
            caption_policy:    CaptionPolicy::FirstOnly,
            train_fraction:    0.8,
            seed:              42,
        }
    }
}

impl TrainConfig {
    /// Cheap checks that would otherwise fail deep inside the run.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.epochs == 0 {
            bail!("epochs must be positive");
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            bail!("train_fraction must lie in [0, 1], got {}", self.train_fraction);
        }
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout must lie in [0, 1), got {}", self.dropout);
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Annotations ───────────────────────────────────────────────
        tracing::info!("Reading captions from '{}'", cfg.captions_file);
        let primary = open_reader(&cfg.captions_file)?;
        let alternates = cfg
            .alt_captions_file
            .as_deref()
            .map(open_reader)
            .transpose()?;
        let records = join_annotation_streams(primary, alternates)?;
        if records.is_empty() {
            bail!("'{}' contains no captions", cfg.captions_file);
        }

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let tokenizer: Box<dyn Tokenize> = match &cfg.tokenizer_json {
            Some(path) => Box::new(HfTokenizer::from_file(path)?),
            None       => Box::new(WhitespaceTokenizer::normalizing()),
        };

        // ── Step 3: Vocabulary over the whole corpus ──────────────────────────
        let vocab = VocabularyBuilder::new(tokenizer.as_ref())
            .with_min_freq(cfg.min_freq)
            .build(corpus_texts(&records))
            .context("Cannot build the vocabulary")?;
        VocabStore::new(&cfg.checkpoint_dir).save(&vocab)?;

        let encoder = SequenceEncoder::new(cfg.max_seq_length)?;

        // ── Step 4: Backbone features ─────────────────────────────────────────
        let features = PrecomputedFeatures::from_json_file(&cfg.features_file)?;

        // ── Step 5: Split by image ────────────────────────────────────────────
        let (train_records, val_records) = split_records(records, cfg.train_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train images, {} validation images",
            train_records.len(),
            val_records.len()
        );

        // ── Step 6: Datasets ──────────────────────────────────────────────────
        // Validation always scores the primary caption
        let train_dataset = CaptionDataset::build(
            &train_records, &vocab, tokenizer.as_ref(), &encoder, &features,
            cfg.caption_policy, cfg.seed,
        )?;
        let val_dataset = CaptionDataset::build(
            &val_records, &vocab, tokenizer.as_ref(), &encoder, &features,
            CaptionPolicy::FirstOnly, cfg.seed,
        )?;

        // ── Step 7: Configs for captioning ────────────────────────────────────
        let model_cfg = CaptioningModelConfig::new(features.feature_width(), vocab.len())
            .with_d_model(cfg.d_model)
            .with_n_head(cfg.n_head)
            .with_num_layers(cfg.num_layers)
            .with_d_ff(cfg.d_ff)
            .with_dropout(cfg.dropout)
            .with_max_seq_length(cfg.max_seq_length)
            .with_activation(cfg.activation);

        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        ckpt_manager.save_model_config(&model_cfg)?;

        // ── Step 8: Training loop (Layer 5) ───────────────────────────────────
        run_training(cfg, &model_cfg, train_dataset, val_dataset, &ckpt_manager)
    }
}

fn open_reader(path: &str) -> Result<BufReader<File>> {
    let file = File::open(Path::new(path))
        .with_context(|| format!("Cannot open annotation file '{path}'"))?;
    Ok(BufReader::new(file))
}
