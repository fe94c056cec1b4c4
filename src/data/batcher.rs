// ============================================================
// Layer 4 — Caption Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks N CaptionSamples into
// the tensors one teacher-forced training step needs.
//
// Teacher forcing shifts each caption by one position:
//
//   ids     = [<bos>, a, dog, runs, <eos>, <pad>]
//   inputs  = [<bos>, a, dog, runs, <eos>]        (ids[..L-1])
//   targets = [a, dog, runs, <eos>, <pad>]        (ids[1..])
//
// Tensor layouts (L = max_seq_length, N = batch size):
//   features       [N, feature_width]
//   inputs         [L-1, N]     sequence-first, like the model
//   targets        [L-1, N]
//   input_padding  [N, L-1]     true = padding (masked out)
//
// Padding targets are <pad> and are ignored by the loss.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::CaptionSample;

#[derive(Debug, Clone)]
pub struct CaptionBatch<B: Backend> {
    /// Backbone features, shape [batch_size, feature_width]
    pub features: Tensor<B, 2>,

    /// Decoder input ids, shape [seq_len - 1, batch_size]
    pub inputs: Tensor<B, 2, Int>,

    /// Next-token targets, shape [seq_len - 1, batch_size]
    pub targets: Tensor<B, 2, Int>,

    /// Padding mask over `inputs`, shape [batch_size, seq_len - 1]
    /// true = padding slot
    pub input_padding: Tensor<B, 2, Bool>,
}

#[derive(Clone, Debug)]
pub struct CaptionBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> CaptionBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<CaptionSample, CaptionBatch<B>> for CaptionBatcher<B> {
    fn batch(&self, items: Vec<CaptionSample>) -> CaptionBatch<B> {
        let batch_size    = items.len();
        // Every caption is pre-padded to the same length
        let seq_len       = items[0].caption.ids.len();
        let steps         = seq_len - 1;
        let feature_width = items[0].features.len();

        let features_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.features.iter().copied())
            .collect();

        let inputs_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.caption.ids[..steps].iter().map(|&x| x as i32))
            .collect();

        let targets_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.caption.ids[1..].iter().map(|&x| x as i32))
            .collect();

        // 1 = padding, 0 = real token
        let padding_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.caption.mask[..steps].iter().map(|&real| i32::from(!real)))
            .collect();

        let features = Tensor::<B, 1>::from_floats(
            features_flat.as_slice(), &self.device
        ).reshape([batch_size, feature_width]);

        // Built row-per-sample, then swapped to sequence-first
        let inputs = Tensor::<B, 1, Int>::from_ints(
            inputs_flat.as_slice(), &self.device
        ).reshape([batch_size, steps]).swap_dims(0, 1);

        let targets = Tensor::<B, 1, Int>::from_ints(
            targets_flat.as_slice(), &self.device
        ).reshape([batch_size, steps]).swap_dims(0, 1);

        let input_padding = Tensor::<B, 1, Int>::from_ints(
            padding_flat.as_slice(), &self.device
        ).reshape([batch_size, steps]).equal_elem(1);

        CaptionBatch { features, inputs, targets, input_padding }
    }
}
