// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// A fixed, bidirectional token <-> id mapping built ONCE from
// the whole caption corpus.
//
// Id layout:
//   0  <unk>   returned for any token not seen in training
//   1  <pad>   fills unused sequence slots
//   2  <bos>   first token of every sequence
//   3  <eos>   last real token of every sequence
//   4… corpus tokens, most frequent first, ties broken by the
//      token text so two builds over the same corpus agree
//
// The ids must never move for the lifetime of a trained model,
// so the vocabulary is immutable after construction and is
// persisted next to the checkpoints (see infra::vocab_store).
//
// Reference: Rust Book §8 (HashMap)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::{CaptionError, CaptionResult};
use crate::domain::traits::Tokenize;

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<pad>";
pub const BOS_TOKEN: &str = "<bos>";
pub const EOS_TOKEN: &str = "<eos>";

pub const UNK_ID: u32 = 0;
pub const PAD_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;

/// Specials in id order.
pub const SPECIAL_TOKENS: [&str; 4] = [UNK_TOKEN, PAD_TOKEN, BOS_TOKEN, EOS_TOKEN];

// ─── Vocabulary ───────────────────────────────────────────────────────────────
/// Serialised as the plain id-ordered token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    itos: Vec<String>,
    stoi: HashMap<String, u32>,
}

impl Vocabulary {
    /// Rebuild a vocabulary from its id-ordered token list.
    ///
    /// The list must start with the four specials in their fixed
    /// order and contain no duplicates.
    pub fn from_tokens(tokens: Vec<String>) -> CaptionResult<Self> {
        let specials_ok = tokens.len() >= SPECIAL_TOKENS.len()
            && tokens.iter().zip(SPECIAL_TOKENS).all(|(t, s)| t == s);
        if !specials_ok {
            return Err(CaptionError::InvalidInput(format!(
                "vocabulary must start with {SPECIAL_TOKENS:?}"
            )));
        }

        let mut stoi = HashMap::with_capacity(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            if stoi.insert(token.clone(), id as u32).is_some() {
                return Err(CaptionError::InvalidInput(format!(
                    "duplicate vocabulary token '{token}'"
                )));
            }
        }
        Ok(Self { itos: tokens, stoi })
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    /// Always false: the specials are present in every vocabulary.
    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.stoi.contains_key(token)
    }

    /// Never fails: unseen tokens map to `<unk>`.
    pub fn token_to_id(&self, token: &str) -> u32 {
        self.stoi.get(token).copied().unwrap_or(UNK_ID)
    }

    pub fn id_to_token(&self, id: u32) -> CaptionResult<&str> {
        self.itos
            .get(id as usize)
            .map(String::as_str)
            .ok_or(CaptionError::OutOfRange { id: id as usize, len: self.itos.len() })
    }

    pub fn is_special(id: u32) -> bool {
        (id as usize) < SPECIAL_TOKENS.len()
    }

    /// Map ids back to tokens, dropping every special token.
    pub fn decode(&self, ids: &[u32]) -> CaptionResult<Vec<&str>> {
        ids.iter()
            .filter(|&&id| !Self::is_special(id))
            .map(|&id| self.id_to_token(id))
            .collect()
    }

    /// Id-ordered tokens, specials included.
    pub fn tokens(&self) -> &[String] {
        &self.itos
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = CaptionError;

    fn try_from(tokens: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_tokens(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(v: Vocabulary) -> Self {
        v.itos
    }
}

// ─── VocabularyBuilder ────────────────────────────────────────────────────────
/// Counts tokens over the full corpus in a single pass and
/// assigns ids.
pub struct VocabularyBuilder<'t, T: Tokenize + ?Sized> {
    tokenizer: &'t T,
    min_freq:  usize,
}

impl<'t, T: Tokenize + ?Sized> VocabularyBuilder<'t, T> {
    pub fn new(tokenizer: &'t T) -> Self {
        Self { tokenizer, min_freq: 1 }
    }

    /// Tokens seen fewer than `min_freq` times are left out and
    /// later resolve to `<unk>`. Zero is treated as one.
    pub fn with_min_freq(mut self, min_freq: usize) -> Self {
        self.min_freq = min_freq.max(1);
        self
    }

    /// Fails on the first caption the tokenizer cannot split.
    pub fn build<'c, I>(&self, corpus: I) -> CaptionResult<Vocabulary>
    where
        I: IntoIterator<Item = &'c str>,
    {
        let mut freq: HashMap<String, usize> = HashMap::new();
        let mut captions = 0usize;
        for caption in corpus {
            captions += 1;
            for token in self.tokenizer.try_tokenize(caption)? {
                *freq.entry(token).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(String, usize)> = freq
            .into_iter()
            .filter(|(w, n)| *n >= self.min_freq && !SPECIAL_TOKENS.contains(&w.as_str()))
            .collect();
        // Descending frequency, then ascending text: fully deterministic
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut itos: Vec<String> = SPECIAL_TOKENS.iter().map(|s| s.to_string()).collect();
        itos.extend(words.into_iter().map(|(w, _)| w));

        let stoi = itos
            .iter()
            .enumerate()
            .map(|(id, t)| (t.clone(), id as u32))
            .collect();

        tracing::debug!(
            "Built vocabulary of {} tokens from {} captions (min_freq={})",
            itos.len(),
            captions,
            self.min_freq
        );

        Ok(Vocabulary { itos, stoi })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tokenizer::WhitespaceTokenizer;

    fn dog_cat_vocab() -> Vocabulary {
        let tok = WhitespaceTokenizer::new();
        VocabularyBuilder::new(&tok).build(["a dog runs", "a cat runs"]).unwrap()
    }

    #[test]
    fn test_specials_then_corpus_tokens() {
        let v = dog_cat_vocab();
        assert_eq!(v.len(), 8);
        assert_eq!(&v.tokens()[..4], &SPECIAL_TOKENS.map(String::from)[..]);
        // "a" and "runs" appear twice, "cat" and "dog" once
        assert_eq!(&v.tokens()[4..], &["a", "runs", "cat", "dog"]);
    }

    #[test]
    fn test_round_trip_for_every_known_token() {
        let v = dog_cat_vocab();
        for t in v.tokens() {
            assert_eq!(v.id_to_token(v.token_to_id(t)).unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_token_maps_to_unk() {
        let v = dog_cat_vocab();
        assert_eq!(v.token_to_id("zebra"), UNK_ID);
    }

    #[test]
    fn test_id_out_of_range() {
        let v = dog_cat_vocab();
        assert_eq!(
            v.id_to_token(8),
            Err(CaptionError::OutOfRange { id: 8, len: 8 })
        );
    }

    #[test]
    fn test_rebuild_is_identical() {
        assert_eq!(dog_cat_vocab(), dog_cat_vocab());
    }

    #[test]
    fn test_min_freq_drops_rare_tokens() {
        let tok = WhitespaceTokenizer::new();
        let v = VocabularyBuilder::new(&tok)
            .with_min_freq(2)
            .build(["a dog runs", "a cat runs"])
            .unwrap();
        assert_eq!(v.len(), 6);
        assert_eq!(v.token_to_id("dog"), UNK_ID);
    }

    #[test]
    fn test_special_text_in_corpus_is_not_duplicated() {
        let tok = WhitespaceTokenizer::new();
        let v = VocabularyBuilder::new(&tok).build(["<eos> dog"]).unwrap();
        assert_eq!(v.len(), 5);
        assert_eq!(v.token_to_id("<eos>"), EOS_ID);
    }

    #[test]
    fn test_decode_drops_specials() {
        let v = dog_cat_vocab();
        let ids = [BOS_ID, v.token_to_id("a"), v.token_to_id("dog"), EOS_ID, PAD_ID];
        assert_eq!(v.decode(&ids).unwrap(), vec!["a", "dog"]);
    }

    #[test]
    fn test_serde_round_trip() {
        let v = dog_cat_vocab();
        let json = serde_json::to_string(&v).unwrap();
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_from_tokens_rejects_missing_specials() {
        let err = Vocabulary::from_tokens(vec!["a".into(), "b".into()]).unwrap_err();
        assert!(matches!(err, CaptionError::InvalidInput(_)));
    }
}
