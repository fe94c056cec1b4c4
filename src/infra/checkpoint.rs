// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything `caption` needs to rebuild the
// exact model that `train` produced.
//
// File layout:
//   checkpoints/
//     train_config.json      ← run settings (TrainConfig)
//     model_config.json      ← architecture (CaptioningModelConfig)
//     vocab.json             ← see vocab_store.rs
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json      ← number of the newest weights file
//     best_epoch.json        ← epoch with the lowest val_loss so far
//     metrics.csv            ← see metrics.rs
//
// Weights go through Burn's CompactRecorder (MessagePack +
// gzip). Loading is type-checked against the architecture, so
// the model config must be restored before the weights.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{CaptioningModel, CaptioningModelConfig};

const TRAIN_CONFIG_FILE: &str = "train_config.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";
const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const BEST_EPOCH_FILE:   &str = "best_epoch.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes {dir}/model_epoch_{epoch}.mpk.gz and moves the
    /// latest-epoch pointer to it.
    pub fn save_model<B: Backend>(&self, model: &CaptioningModel<B>, epoch: usize) -> Result<()> {
        // The recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_EPOCH_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Points best_epoch.json at an already saved epoch.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        let best_path = self.dir.join(BEST_EPOCH_FILE);
        fs::write(&best_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {BEST_EPOCH_FILE}"))?;

        tracing::debug!("Best checkpoint is now epoch {}", epoch);
        Ok(())
    }

    /// Removes a best_epoch.json left by an earlier run.
    pub fn clear_best(&self) -> Result<()> {
        let best_path = self.dir.join(BEST_EPOCH_FILE);
        if best_path.exists() {
            fs::remove_file(&best_path)
                .with_context(|| format!("Cannot remove stale '{}'", best_path.display()))?;
        }
        Ok(())
    }

    /// Loads the latest weights into `model`, which must have the
    /// architecture the checkpoint was saved with.
    pub fn load_model<B: Backend>(
        &self,
        model:  CaptioningModel<B>,
        device: &B::Device,
    ) -> Result<CaptioningModel<B>> {
        self.load_model_at(model, self.latest_epoch()?, device)
    }

    /// Loads the weights saved after `epoch`.
    pub fn load_model_at<B: Backend>(
        &self,
        model:  CaptioningModel<B>,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<CaptioningModel<B>> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(TRAIN_CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn save_model_config(&self, cfg: &CaptioningModelConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<CaptioningModelConfig> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        CaptioningModelConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read model config '{}': {e}", path.display()))
    }

    /// Returns an error if training hasn't been run yet.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_EPOCH_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| {
                format!("Cannot find '{LATEST_EPOCH_FILE}'. Have you run 'train' first?")
            })?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    /// Returns an error if no epoch has been marked best, e.g. when
    /// every validation loss was NaN.
    pub fn best_epoch(&self) -> Result<usize> {
        let path = self.dir.join(BEST_EPOCH_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{BEST_EPOCH_FILE}'. No epoch was marked best."))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
