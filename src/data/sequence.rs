// ============================================================
// Layer 4 — Sequence Encoder
// ============================================================
// Turns one caption into a fixed-length id sequence plus a
// boolean attention mask (true = real token).
//
//   "a dog runs", max_seq_length = 6
//       tokens → [a, dog, runs]
//       ids    → [<bos>, a, dog, runs, <eos>, <pad>]
//       mask   → [T,     T, T,   T,    T,     F    ]
//
// Too-long captions are cut so the last slot holds <eos>:
//
//   8 tokens with specials, max_seq_length = 5
//       ids    → [<bos>, t1, t2, t3, <eos>]
//       mask   → [T, T, T, T, T]
//
// Invariants for every output:
//   - ids.len() == mask.len() == max_seq_length
//   - ids[0] == <bos>, exactly one <eos>
//   - mask is true…true false…false (padding is trailing only)

use serde::{Deserialize, Serialize};

use crate::data::vocabulary::{Vocabulary, BOS_ID, EOS_ID, PAD_ID, UNK_ID};
use crate::domain::error::{CaptionError, CaptionResult};
use crate::domain::traits::Tokenize;

/// Smallest length that still fits `<bos>` and `<eos>`.
pub const MIN_SEQ_LENGTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSequence {
    pub ids:  Vec<u32>,
    pub mask: Vec<bool>,
}

impl EncodedSequence {
    /// Number of real (non-padding) positions.
    pub fn real_len(&self) -> usize {
        self.mask.iter().take_while(|&&m| m).count()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceEncoder {
    max_seq_length: usize,
}

impl SequenceEncoder {
    pub fn new(max_seq_length: usize) -> CaptionResult<Self> {
        if max_seq_length < MIN_SEQ_LENGTH {
            return Err(CaptionError::InvalidInput(format!(
                "max_seq_length must be at least {MIN_SEQ_LENGTH} to hold <bos> and <eos>, got {max_seq_length}"
            )));
        }
        Ok(Self { max_seq_length })
    }

    pub fn max_seq_length(&self) -> usize {
        self.max_seq_length
    }

    pub fn encode<T: Tokenize + ?Sized>(
        &self,
        caption:   &str,
        vocab:     &Vocabulary,
        tokenizer: &T,
    ) -> CaptionResult<EncodedSequence> {
        let max    = self.max_seq_length;
        let tokens = tokenizer.try_tokenize(caption)?;

        let mut ids = Vec::with_capacity(max);
        ids.push(BOS_ID);
        ids.extend(tokens.iter().map(|t| {
            // Literal special text inside a caption must not introduce
            // a second <bos>/<eos> or an interior <pad>.
            match vocab.token_to_id(t) {
                id if Vocabulary::is_special(id) => UNK_ID,
                id => id,
            }
        }));
        ids.push(EOS_ID);

        if ids.len() > max {
            ids.truncate(max - 1);
            ids.push(EOS_ID);
            return Ok(EncodedSequence { ids, mask: vec![true; max] });
        }

        let real = ids.len();
        ids.resize(max, PAD_ID);
        let mut mask = vec![true; real];
        mask.resize(max, false);
        Ok(EncodedSequence { ids, mask })
    }
}

/// One-shot form of [`SequenceEncoder::encode`].
pub fn encode_caption<T: Tokenize + ?Sized>(
    caption:        &str,
    vocab:          &Vocabulary,
    tokenizer:      &T,
    max_seq_length: usize,
) -> CaptionResult<EncodedSequence> {
    SequenceEncoder::new(max_seq_length)?.encode(caption, vocab, tokenizer)
}
