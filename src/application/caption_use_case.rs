// ============================================================
// Layer 2 — Caption Use Case
// ============================================================
// Rebuilds the trained captioner from a checkpoint directory:
//
//   model_config.json  → architecture
//   model_epoch_N      → weights of the latest (or best) epoch
//   vocab.json         → id ↔ token mapping
//
// and captions an image identifier through the precomputed
// feature store.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::infra::{
    checkpoint::CheckpointManager,
    feature_store::PrecomputedFeatures,
    vocab_store::VocabStore,
};
use crate::ml::{generator::Captioner, model::CaptioningModel};

type InferBackend = burn::backend::Wgpu;

pub struct CaptionUseCase {
    captioner: Captioner<InferBackend, PrecomputedFeatures>,
}

impl CaptionUseCase {
    /// `max_len` overrides the trained sequence length when given.
    /// `best` loads the lowest-val_loss epoch instead of the latest.
    pub fn new(
        checkpoint_dir: &str,
        features_file:  &str,
        max_len:        Option<usize>,
        best:           bool,
    ) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let ckpt   = CheckpointManager::new(checkpoint_dir)?;

        // Dropout off: inference must be deterministic
        let model_cfg = ckpt.load_model_config()?.with_dropout(0.0);
        let model: CaptioningModel<InferBackend> = model_cfg.init(&device)?;
        let model = if best {
            ckpt.load_model_at(model, ckpt.best_epoch()?, &device)?
        } else {
            ckpt.load_model(model, &device)?
        };
        tracing::info!("Model loaded from checkpoint");

        let vocab    = VocabStore::new(checkpoint_dir).load()?;
        let features = PrecomputedFeatures::from_json_file(features_file)?;
        let max_len  = max_len.unwrap_or(model_cfg.max_seq_length);

        let captioner = Captioner::new(Arc::new(features), model, vocab, max_len, device)
            .context("Checkpoint does not match the feature store")?;
        Ok(Self { captioner })
    }

    pub fn caption(&self, image_id: &str) -> Result<String> {
        self.captioner
            .caption(image_id)
            .with_context(|| format!("Cannot caption image '{image_id}'"))
    }
}
