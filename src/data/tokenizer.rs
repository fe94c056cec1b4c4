// ============================================================
// Layer 4 — Caption Tokenizers
// ============================================================
// Two concrete implementations of the `Tokenize` trait:
//
//   WhitespaceTokenizer → split on whitespace; optionally
//                         normalise first (lowercase, drop
//                         punctuation, collapse odd whitespace)
//   HfTokenizer         → wraps a HuggingFace `tokenizer.json`
//                         and returns its token strings
//
// Caption text in annotation files is noisy in the same way
// document text is: non-breaking spaces, stray tabs, trailing
// " ." tokens. Normalising removes these before counting so
// they do not waste vocabulary slots.
//
// Reference: Rust Book §8 (Strings in Rust)
//            tokenizers crate documentation

use std::path::Path;

use anyhow::Result;
use tokenizers::Tokenizer;

use crate::domain::error::{CaptionError, CaptionResult};
use crate::domain::traits::Tokenize;

// ─── WhitespaceTokenizer ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhitespaceTokenizer {
    normalize: bool,
}

impl WhitespaceTokenizer {
    /// Plain whitespace split; tokens are kept verbatim.
    pub fn new() -> Self {
        Self { normalize: false }
    }

    /// Lowercase and strip punctuation before splitting.
    pub fn normalizing() -> Self {
        Self { normalize: true }
    }

    /// Lowercase, map punctuation and Unicode whitespace variants
    /// to plain spaces. Apostrophes inside words are kept so
    /// "dog's" stays a single token.
    pub fn normalize(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                '\'' => '\'',
                c if c.is_control() => ' ',
                c if c.is_ascii_punctuation() => ' ',
                c => c,
            })
            .flat_map(char::to_lowercase)
            .collect()
    }
}

impl Tokenize for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        if self.normalize {
            Self::normalize(text)
                .split_whitespace()
                .map(|w| w.trim_matches('\'').to_string())
                .filter(|w| !w.is_empty())
                .collect()
        } else {
            text.split_whitespace().map(str::to_string).collect()
        }
    }
}

// ─── HfTokenizer ──────────────────────────────────────────────────────────────
/// Adapter over a HuggingFace tokenizer. Only the token strings
/// are used: ids are always assigned by our own `Vocabulary`.
pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn new(inner: Tokenizer) -> Self {
        Self { inner }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e)
        })?;
        Ok(Self { inner })
    }
}

impl Tokenize for HfTokenizer {
    /// Lossy form: an encoding failure yields no tokens. Vocabulary
    /// and dataset construction go through `try_tokenize` instead.
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.try_tokenize(text).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Vec::new()
        })
    }

    fn try_tokenize(&self, text: &str) -> CaptionResult<Vec<String>> {
        self.inner
            .encode(text, false)
            .map(|enc| enc.get_tokens().to_vec())
            .map_err(|e| {
                CaptionError::InvalidInput(format!("tokenizer failed on caption {text:?}: {e}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split_keeps_case_and_punctuation() {
        let t = WhitespaceTokenizer::new();
        assert_eq!(t.tokenize("A dog  runs ."), vec!["A", "dog", "runs", "."]);
    }

    #[test]
    fn test_normalizing_lowercases_and_drops_punctuation() {
        let t = WhitespaceTokenizer::normalizing();
        assert_eq!(
            t.tokenize("A Dog, running\u{00A0}fast ."),
            vec!["a", "dog", "running", "fast"]
        );
    }

    #[test]
    fn test_normalizing_keeps_inner_apostrophe() {
        let t = WhitespaceTokenizer::normalizing();
        assert_eq!(t.tokenize("the dog's ball"), vec!["the", "dog's", "ball"]);
    }

    #[test]
    fn test_empty_caption() {
        assert!(WhitespaceTokenizer::normalizing().tokenize("   ").is_empty());
    }

    // ─── HfTokenizer ───────────────────────────────────────────────────────────

    /// WordLevel tokenizer.json with a whitespace pre-tokenizer.
    fn word_level(vocab: &str) -> HfTokenizer {
        let json = format!(
            r#"{{
                "version": "1.0",
                "truncation": null,
                "padding": null,
                "added_tokens": [],
                "normalizer": null,
                "pre_tokenizer": {{ "type": "Whitespace" }},
                "post_processor": null,
                "decoder": null,
                "model": {{ "type": "WordLevel", "vocab": {vocab}, "unk_token": "[UNK]" }}
            }}"#
        );
        HfTokenizer::new(json.parse::<Tokenizer>().unwrap())
    }

    #[test]
    fn test_hf_tokens_feed_the_vocabulary() {
        use crate::data::vocabulary::{VocabularyBuilder, UNK_TOKEN};

        let hf = word_level(r#"{ "[UNK]": 0, "a": 1, "dog": 2, "runs": 3 }"#);
        assert_eq!(hf.tokenize("a dog runs"), vec!["a", "dog", "runs"]);
        assert_eq!(hf.try_tokenize("a zebra").unwrap(), vec!["a", "[UNK]"]);

        let vocab = VocabularyBuilder::new(&hf).build(["a dog runs", "a dog"]).unwrap();
        assert!(vocab.token_to_id("dog") != vocab.token_to_id(UNK_TOKEN));
        assert!(vocab.token_to_id("runs") != vocab.token_to_id(UNK_TOKEN));
        assert_eq!(vocab.token_to_id("zebra"), vocab.token_to_id(UNK_TOKEN));
    }

    #[test]
    fn test_hf_encode_failure_is_an_error() {
        use crate::data::vocabulary::VocabularyBuilder;

        // No "[UNK]" entry: out-of-vocabulary words cannot be encoded.
        let hf = word_level(r#"{ "a": 0, "dog": 1 }"#);
        assert!(matches!(
            hf.try_tokenize("a zebra"),
            Err(CaptionError::InvalidInput(_))
        ));
        assert!(hf.tokenize("a zebra").is_empty());
        assert!(VocabularyBuilder::new(&hf).build(["a dog", "a zebra"]).is_err());
    }
}
