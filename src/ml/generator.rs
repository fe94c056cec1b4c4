// ============================================================
// Layer 5 — Greedy Caption Generator
// ============================================================
// Autoregressive decoding, one token per model call:
//
//   tokens = [<bos>]
//   loop:
//     logits = model(features, tokens)        [t, 1, vocab]
//     next   = argmax(logits[t - 1])
//     tokens.push(next)
//   until next == <eos> or len(tokens) == max_len
//
// The causal mask makes the logits of the last position depend
// only on the tokens generated so far, so no padding is needed.
//
// Captioner wraps the whole path image → text: it owns an
// injected FeatureExtractor, the trained model and the
// vocabulary used to build it.

use std::sync::Arc;

use burn::prelude::*;

use crate::data::sequence::MIN_SEQ_LENGTH;
use crate::data::vocabulary::{Vocabulary, BOS_ID, EOS_ID};
use crate::domain::error::{CaptionError, CaptionResult};
use crate::domain::traits::FeatureExtractor;
use crate::ml::model::CaptioningModel;

fn check_decode_length<B: Backend>(model: &CaptioningModel<B>, max_len: usize) -> CaptionResult<()> {
    if max_len < MIN_SEQ_LENGTH || max_len > model.max_seq_length() {
        return Err(CaptionError::InvalidInput(format!(
            "decode length {max_len} must lie in {MIN_SEQ_LENGTH}..={}",
            model.max_seq_length()
        )));
    }
    Ok(())
}

/// Returns the generated ids after `<bos>`, ending with `<eos>`
/// when the model produced one within `max_len` tokens.
pub fn greedy_decode<B: Backend>(
    model:    &CaptioningModel<B>,
    features: &[f32],
    max_len:  usize,
    device:   &B::Device,
) -> CaptionResult<Vec<u32>> {
    if features.len() != model.feature_width {
        return Err(CaptionError::ShapeMismatch(format!(
            "feature vector has width {}, model expects {}",
            features.len(),
            model.feature_width
        )));
    }
    check_decode_length(model, max_len)?;

    let features = Tensor::<B, 2>::from_data(
        TensorData::new(features.to_vec(), [1, model.feature_width]),
        device,
    );

    let mut tokens: Vec<i64> = vec![BOS_ID as i64];
    while tokens.len() < max_len {
        let t = tokens.len();
        let input = Tensor::<B, 2, Int>::from_data(
            TensorData::new(tokens.clone(), [t, 1]),
            device,
        );
        let logits = model.forward(features.clone(), input, None)?;
        let [_, _, vocab] = logits.dims();

        let next = logits
            .slice([t - 1..t, 0..1, 0..vocab])
            .reshape([vocab])
            .argmax(0)
            .into_scalar()
            .elem::<i64>();
        tokens.push(next);
        if next == EOS_ID as i64 {
            break;
        }
    }

    tracing::debug!("Greedy decode produced {} tokens", tokens.len() - 1);
    Ok(tokens[1..].iter().map(|&id| id as u32).collect())
}

pub struct Captioner<B: Backend, E: FeatureExtractor + ?Sized> {
    extractor: Arc<E>,
    model:     CaptioningModel<B>,
    vocab:     Vocabulary,
    max_len:   usize,
    device:    B::Device,
}

impl<B: Backend, E: FeatureExtractor + ?Sized> Captioner<B, E> {
    pub fn new(
        extractor: Arc<E>,
        model:     CaptioningModel<B>,
        vocab:     Vocabulary,
        max_len:   usize,
        device:    B::Device,
    ) -> CaptionResult<Self> {
        if extractor.feature_width() != model.feature_width {
            return Err(CaptionError::ShapeMismatch(format!(
                "backbone produces width {}, model projects width {}",
                extractor.feature_width(),
                model.feature_width
            )));
        }
        if vocab.len() != model.vocab_size {
            return Err(CaptionError::ShapeMismatch(format!(
                "vocabulary has {} tokens, model predicts {}",
                vocab.len(),
                model.vocab_size
            )));
        }
        check_decode_length(&model, max_len)?;
        Ok(Self { extractor, model, vocab, max_len, device })
    }

    /// Extract → decode → detokenize. Special tokens never
    /// appear in the returned text.
    pub fn caption(&self, input: &E::Input) -> CaptionResult<String> {
        let features = self.extractor.extract(input)?;
        let ids = greedy_decode(&self.model, &features, self.max_len, &self.device)?;
        Ok(self.vocab.decode(&ids)?.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::data::tokenizer::WhitespaceTokenizer;
    use crate::data::vocabulary::VocabularyBuilder;
    use crate::ml::model::CaptioningModelConfig;

    type TestBackend = NdArray;

    struct FixedBackbone;

    impl FeatureExtractor for FixedBackbone {
        type Input = str;

        fn feature_width(&self) -> usize {
            6
        }

        fn extract(&self, input: &str) -> CaptionResult<Vec<f32>> {
            match input {
                "img" => Ok(vec![0.25; 6]),
                other => Err(CaptionError::InvalidInput(format!("unknown image '{other}'"))),
            }
        }
    }

    fn vocab() -> Vocabulary {
        let tok = WhitespaceTokenizer::new();
        VocabularyBuilder::new(&tok).build(["a dog runs", "a cat sits"]).unwrap()
    }

    fn model(vocab_size: usize) -> CaptioningModel<TestBackend> {
        CaptioningModelConfig::new(6, vocab_size)
            .with_d_model(8)
            .with_n_head(2)
            .with_num_layers(1)
            .with_d_ff(16)
            .with_dropout(0.0)
            .with_max_seq_length(6)
            .init(&Default::default())
            .unwrap()
    }

    #[test]
    fn test_decode_respects_length_limit() {
        let m = model(9);
        let ids = greedy_decode(&m, &[0.1; 6], 5, &Default::default()).unwrap();
        assert!(!ids.is_empty() && ids.len() <= 4);
        // <eos> can only be the last id
        if let Some(pos) = ids.iter().position(|&id| id == EOS_ID) {
            assert_eq!(pos, ids.len() - 1);
        }
        assert!(ids.iter().all(|&id| id < 9));
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let m = model(9);
        let device = Default::default();
        assert!(matches!(
            greedy_decode(&m, &[0.1; 6], 1, &device),
            Err(CaptionError::InvalidInput(_))
        ));
        assert!(matches!(
            greedy_decode(&m, &[0.1; 6], 7, &device),
            Err(CaptionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_feature_width() {
        let m = model(9);
        let err = greedy_decode(&m, &[0.1; 5], 4, &Default::default()).unwrap_err();
        assert!(matches!(err, CaptionError::ShapeMismatch(_)));
    }

    #[test]
    fn test_captioner_output_has_no_specials() {
        let v = vocab();
        let m = model(v.len());
        let captioner =
            Captioner::new(Arc::new(FixedBackbone), m, v, 6, Default::default()).unwrap();
        let text = captioner.caption("img").unwrap();
        for special in ["<bos>", "<eos>", "<pad>", "<unk>"] {
            assert!(!text.contains(special));
        }
    }

    #[test]
    fn test_captioner_surfaces_backbone_errors() {
        let v = vocab();
        let m = model(v.len());
        let captioner =
            Captioner::new(Arc::new(FixedBackbone), m, v, 6, Default::default()).unwrap();
        assert!(matches!(captioner.caption("missing"), Err(CaptionError::InvalidInput(_))));
    }

    #[test]
    fn test_captioner_rejects_vocab_size_mismatch() {
        let v = vocab();
        let m = model(v.len() + 1);
        let result = Captioner::new(Arc::new(FixedBackbone), m, v, 6, Default::default());
        assert!(matches!(result, Err(CaptionError::ShapeMismatch(_))));
    }

    #[test]
    fn test_captioner_rejects_out_of_range_length() {
        for max_len in [1, 7, 100] {
            let v = vocab();
            let m = model(v.len());
            let result = Captioner::new(Arc::new(FixedBackbone), m, v, max_len, Default::default());
            assert!(matches!(result, Err(CaptionError::InvalidInput(_))), "max_len={max_len}");
        }
    }
}
