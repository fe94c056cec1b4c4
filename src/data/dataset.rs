use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::sequence::{EncodedSequence, SequenceEncoder};
use crate::data::vocabulary::Vocabulary;
use crate::domain::caption_record::{CaptionPolicy, CaptionRecord};
use crate::domain::error::CaptionResult;
use crate::domain::traits::{FeatureExtractor, Tokenize};

/// One image feature vector paired with one encoded caption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSample {
    pub image_id: String,
    pub features: Vec<f32>,
    pub caption:  EncodedSequence,
}

/// Shared epoch number, advanced by the trainer and read by
/// dataset workers for `CaptionPolicy::RandomPerEpoch`.
#[derive(Debug, Clone, Default)]
pub struct EpochCounter(Arc<AtomicUsize>);

impl EpochCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, epoch: usize) {
        self.0.store(epoch, Ordering::Relaxed);
    }
}

struct CachedImage {
    image_id: String,
    features: Vec<f32>,
    variants: Vec<EncodedSequence>,
}

/// Every caption is tokenised and encoded once, at construction;
/// `get` is a pure lookup.
pub struct CaptionDataset {
    images: Vec<CachedImage>,
    /// (image index, variant index); variant is `None` when it is
    /// drawn per epoch.
    index:  Vec<(usize, Option<usize>)>,
    seed:   u64,
    epoch:  EpochCounter,
}

impl CaptionDataset {
    pub fn build<T, E>(
        records:   &[CaptionRecord],
        vocab:     &Vocabulary,
        tokenizer: &T,
        encoder:   &SequenceEncoder,
        extractor: &E,
        policy:    CaptionPolicy,
        seed:      u64,
    ) -> CaptionResult<Self>
    where
        T: Tokenize + ?Sized,
        E: FeatureExtractor<Input = str> + ?Sized,
    {
        let mut images = Vec::with_capacity(records.len());
        let mut index  = Vec::new();

        for (i, record) in records.iter().enumerate() {
            let features = extractor.extract(record.image_id())?;
            let captions = match policy {
                CaptionPolicy::FirstOnly => &record.captions()[..1],
                _ => record.captions(),
            };
            let variants: Vec<EncodedSequence> = captions
                .iter()
                .map(|c| encoder.encode(c, vocab, tokenizer))
                .collect::<CaptionResult<_>>()?;

            match policy {
                CaptionPolicy::FirstOnly      => index.push((i, Some(0))),
                CaptionPolicy::AllVariants    => index.extend((0..variants.len()).map(|v| (i, Some(v)))),
                CaptionPolicy::RandomPerEpoch => index.push((i, None)),
            }

            images.push(CachedImage {
                image_id: record.image_id().to_string(),
                features,
                variants,
            });
        }

        tracing::debug!(
            "Cached {} samples from {} images (policy={})",
            index.len(),
            images.len(),
            policy
        );

        Ok(Self { images, index, seed, epoch: EpochCounter::default() })
    }

    /// Handle the trainer uses to advance the epoch after the
    /// dataset has moved into a data loader.
    pub fn epoch_counter(&self) -> EpochCounter {
        self.epoch.clone()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn pick_variant(&self, index: usize, image: &CachedImage) -> usize {
        let epoch = self.epoch.get() as u64;
        let mixed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(epoch.wrapping_mul(0xBF58_476D_1CE4_E5B9))
            .wrapping_add(index as u64);
        StdRng::seed_from_u64(mixed).gen_range(0..image.variants.len())
    }
}

impl Dataset<CaptionSample> for CaptionDataset {
    fn get(&self, index: usize) -> Option<CaptionSample> {
        let &(image_idx, variant) = self.index.get(index)?;
        let image   = &self.images[image_idx];
        let variant = variant.unwrap_or_else(|| self.pick_variant(index, image));
        Some(CaptionSample {
            image_id: image.image_id.clone(),
            features: image.features.clone(),
            caption:  image.variants[variant].clone(),
        })
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::data::tokenizer::WhitespaceTokenizer;
    use crate::data::vocabulary::VocabularyBuilder;
    use crate::domain::error::CaptionError;
    use crate::infra::feature_store::PrecomputedFeatures;

    fn records() -> Vec<CaptionRecord> {
        vec![
            CaptionRecord::new("a", vec!["a dog runs".into(), "dog run".into()]).unwrap(),
            CaptionRecord::new("b", vec!["a cat runs".into()]).unwrap(),
        ]
    }

    fn build(policy: CaptionPolicy) -> CaptionDataset {
        let tok   = WhitespaceTokenizer::new();
        let recs  = records();
        let vocab = VocabularyBuilder::new(&tok)
            .build(recs.iter().flat_map(|r| r.captions().iter().map(String::as_str)))
            .unwrap();
        let store = PrecomputedFeatures::from_map(HashMap::from([
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![0.0, 1.0]),
        ]))
        .unwrap();
        let encoder = SequenceEncoder::new(6).unwrap();
        CaptionDataset::build(&recs, &vocab, &tok, &encoder, &store, policy, 7).unwrap()
    }

    #[test]
    fn test_first_only_has_one_sample_per_image() {
        let ds = build(CaptionPolicy::FirstOnly);
        assert_eq!(ds.len(), 2);
        let s = ds.get(0).unwrap();
        assert_eq!(s.image_id, "a");
        assert_eq!(s.features, vec![1.0, 0.0]);
        assert_eq!(s.caption.real_len(), 5);
    }

    #[test]
    fn test_all_variants_has_one_sample_per_caption() {
        let ds = build(CaptionPolicy::AllVariants);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(1).unwrap().image_id, "a");
        assert_eq!(ds.get(2).unwrap().image_id, "b");
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_random_per_epoch_is_stable_within_an_epoch() {
        let ds = build(CaptionPolicy::RandomPerEpoch);
        assert_eq!(ds.len(), 2);
        let first = ds.get(0).unwrap().caption;
        assert_eq!(ds.get(0).unwrap().caption, first);
    }

    #[test]
    fn test_random_per_epoch_eventually_uses_both_variants() {
        let ds = build(CaptionPolicy::RandomPerEpoch);
        let counter = ds.epoch_counter();
        let mut seen = std::collections::HashSet::new();
        for epoch in 0..64 {
            counter.set(epoch);
            seen.insert(ds.get(0).unwrap().caption.real_len());
        }
        // "a dog runs" → 5 real positions, "dog run" → 4
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_missing_features_fail_the_build() {
        let tok   = WhitespaceTokenizer::new();
        let recs  = records();
        let vocab = VocabularyBuilder::new(&tok).build(["a dog runs"]).unwrap();
        let store = PrecomputedFeatures::from_map(HashMap::from([("a".to_string(), vec![1.0])]))
            .unwrap();
        let encoder = SequenceEncoder::new(4).unwrap();
        let result = CaptionDataset::build(
            &recs, &vocab, &tok, &encoder, &store, CaptionPolicy::FirstOnly, 0,
        );
        assert!(result.is_err());
    }

    /// Splits on whitespace but refuses any caption mentioning a cat.
    struct NoCats;

    impl Tokenize for NoCats {
        fn tokenize(&self, text: &str) -> Vec<String> {
            self.try_tokenize(text).unwrap_or_default()
        }

        fn try_tokenize(&self, text: &str) -> CaptionResult<Vec<String>> {
            if text.contains("cat") {
                return Err(CaptionError::InvalidInput(format!("cannot split {text:?}")));
            }
            Ok(text.split_whitespace().map(str::to_string).collect())
        }
    }

    #[test]
    fn test_tokenizer_failure_fails_the_build() {
        let recs  = records();
        let vocab = VocabularyBuilder::new(&WhitespaceTokenizer::new())
            .build(["a dog runs", "a cat runs"])
            .unwrap();
        let store = PrecomputedFeatures::from_map(HashMap::from([
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![0.0, 1.0]),
        ]))
        .unwrap();
        let encoder = SequenceEncoder::new(6).unwrap();
        let result = CaptionDataset::build(
            &recs, &vocab, &NoCats, &encoder, &store, CaptionPolicy::FirstOnly, 0,
        );
        assert!(matches!(result, Err(CaptionError::InvalidInput(_))));
    }
}
