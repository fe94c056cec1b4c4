// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Persists the vocabulary built at training time so captioning
// decodes with exactly the same id ↔ token mapping.
//
// vocab.json is the id-ordered token list:
//   ["<unk>", "<pad>", "<bos>", "<eos>", "a", "dog", ...]
//
// Loading goes through Vocabulary's own validation, so a file
// with the specials moved or duplicated tokens is rejected.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::vocabulary::Vocabulary;

const VOCAB_FILE: &str = "vocab.json";

pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(VOCAB_FILE)
    }

    pub fn save(&self, vocab: &Vocabulary) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(vocab)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;
        tracing::info!("Vocabulary of {} tokens saved to '{}'", vocab.len(), path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Vocabulary> {
        let path = self.path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read vocabulary from '{}'", path.display()))?;
        let vocab: Vocabulary = serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid vocabulary", path.display()))?;
        tracing::debug!("Loaded vocabulary of {} tokens", vocab.len());
        Ok(vocab)
    }
}
