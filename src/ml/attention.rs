// ============================================================
// Layer 5 — Multi-Head Scaled Dot-Product Attention
// ============================================================
// One routine serves both attention sites in the decoder:
//
//   self-attention   query = key = value = target
//                    mask  = causal OR target padding
//   cross-attention  query = target, key = value = memory
//                    mask  = memory padding only (no causal)
//
// Per head:
//   weights = softmax(Q Kᵀ / √head_dim, masked) ;  out = weights V
//
// Mask convention (true = blocked). A blocked score is filled
// with MASKED_SCORE before the softmax, and the weight is set
// to exactly 0.0 after it. The second step makes "zero
// attention" exact and keeps fully-blocked rows at zero instead
// of NaN.
//
// Layouts: inputs are sequence-first [len, batch, d_model];
// heads are computed as [batch, heads, len, head_dim].
//
// Reference: Vaswani et al. (2017) §3.2

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

use crate::domain::error::{CaptionError, CaptionResult};

/// Score given to blocked positions before the softmax.
pub const MASKED_SCORE: f32 = -1.0e9;

#[derive(Config, Debug)]
pub struct AttentionBlockConfig {
    pub d_model: usize,
    pub n_head:  usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl AttentionBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionResult<AttentionBlock<B>> {
        if self.n_head == 0 {
            return Err(CaptionError::ConfigurationError(
                "attention needs at least one head".into(),
            ));
        }
        if self.d_model % self.n_head != 0 {
            return Err(CaptionError::ShapeMismatch(format!(
                "d_model {} is not divisible by {} heads",
                self.d_model, self.n_head
            )));
        }
        let d = self.d_model;
        Ok(AttentionBlock {
            query:    LinearConfig::new(d, d).init(device),
            key:      LinearConfig::new(d, d).init(device),
            value:    LinearConfig::new(d, d).init(device),
            output:   LinearConfig::new(d, d).init(device),
            dropout:  DropoutConfig::new(self.dropout).init(),
            n_head:   self.n_head,
            head_dim: d / self.n_head,
        })
    }
}

#[derive(Module, Debug)]
pub struct AttentionBlock<B: Backend> {
    query:    Linear<B>,
    key:      Linear<B>,
    value:    Linear<B>,
    output:   Linear<B>,
    dropout:  Dropout,
    n_head:   usize,
    head_dim: usize,
}

pub struct AttentionOutput<B: Backend> {
    /// [query_len, batch, d_model]
    pub context: Tensor<B, 3>,
    /// Post-mask, pre-dropout weights, [batch, heads, query_len, key_len]
    pub weights: Tensor<B, 4>,
}

impl<B: Backend> AttentionBlock<B> {
    /// query: [q_len, batch, d_model]; key/value: [k_len, batch, d_model];
    /// mask: [batch, q_len, k_len], true = blocked.
    pub fn forward(
        &self,
        query: Tensor<B, 3>,
        key:   Tensor<B, 3>,
        value: Tensor<B, 3>,
        mask:  Option<Tensor<B, 3, Bool>>,
    ) -> AttentionOutput<B> {
        let [q_len, batch, d_model] = query.dims();
        let [k_len, _, _] = key.dims();

        let q = self.split_heads(self.query.forward(query));
        let k = self.split_heads(self.key.forward(key));
        let v = self.split_heads(self.value.forward(value));

        let scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((self.head_dim as f32).sqrt());

        let weights = match mask {
            Some(mask) => {
                let mask = mask
                    .unsqueeze_dim::<4>(1)
                    .expand([batch, self.n_head, q_len, k_len]);
                softmax(scores.mask_fill(mask.clone(), MASKED_SCORE), 3).mask_fill(mask, 0.0)
            }
            None => softmax(scores, 3),
        };

        // [batch, heads, q_len, head_dim] → [q_len, batch, d_model]
        let context = self
            .dropout
            .forward(weights.clone())
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, q_len, d_model])
            .swap_dims(0, 1);

        AttentionOutput { context: self.output.forward(context), weights }
    }

    /// [len, batch, d_model] → [batch, heads, len, head_dim]
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [len, batch, _] = x.dims();
        x.swap_dims(0, 1)
            .reshape([batch, len, self.n_head, self.head_dim])
            .swap_dims(1, 2)
    }

    pub fn n_head(&self) -> usize {
        self.n_head
    }
}

// ─── Mask builders ────────────────────────────────────────────────────────────
// All return true = blocked.

/// [len, len], true strictly above the diagonal (key after query).
pub fn causal_mask<B: Backend>(len: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    Tensor::<B, 2>::ones([len, len], device)
        .triu(1)
        .greater_elem(0.5)
}

/// Self-attention mask [batch, len, len]: causal, plus any key
/// position flagged in `padding` ([batch, len], true = padding).
pub fn self_attention_mask<B: Backend>(
    padding: Option<Tensor<B, 2, Bool>>,
    batch:   usize,
    len:     usize,
    device:  &B::Device,
) -> Tensor<B, 3, Bool> {
    let causal = causal_mask::<B>(len, device)
        .unsqueeze::<3>()
        .expand([batch, len, len]);
    match padding {
        Some(padding) => {
            let padding = padding.unsqueeze_dim::<3>(1).expand([batch, len, len]);
            // Boolean OR through integer addition
            causal.int().add(padding.int()).greater_elem(0)
        }
        None => causal,
    }
}

/// Cross-attention mask [batch, q_len, mem_len] from a memory
/// padding mask ([batch, mem_len]). No causal component.
pub fn cross_attention_mask<B: Backend>(
    memory_padding: Tensor<B, 2, Bool>,
    q_len:          usize,
) -> Tensor<B, 3, Bool> {
    let [batch, mem_len] = memory_padding.dims();
    memory_padding
        .unsqueeze_dim::<3>(1)
        .expand([batch, q_len, mem_len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn block(d_model: usize, n_head: usize) -> AttentionBlock<TestBackend> {
        AttentionBlockConfig::new(d_model, n_head)
            .with_dropout(0.0)
            .init(&Default::default())
            .unwrap()
    }

    fn padding(rows: &[&[bool]]) -> Tensor<TestBackend, 2, Bool> {
        let batch = rows.len();
        let len   = rows[0].len();
        let flat: Vec<i32> = rows.iter().flat_map(|r| r.iter().map(|&p| i32::from(p))).collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([batch, len])
            .equal_elem(1)
    }

    #[test]
    fn test_rejects_indivisible_width() {
        let err = AttentionBlockConfig::new(10, 3)
            .init::<TestBackend>(&Default::default())
            .unwrap_err();
        assert!(matches!(err, CaptionError::ShapeMismatch(_)));
    }

    #[test]
    fn test_rejects_zero_heads() {
        let err = AttentionBlockConfig::new(8, 0)
            .init::<TestBackend>(&Default::default())
            .unwrap_err();
        assert!(matches!(err, CaptionError::ConfigurationError(_)));
    }

    #[test]
    fn test_output_shapes() {
        let device = Default::default();
        let attn = block(8, 2);
        let q = Tensor::<TestBackend, 3>::random([5, 3, 8], Distribution::Default, &device);
        let m = Tensor::<TestBackend, 3>::random([2, 3, 8], Distribution::Default, &device);
        let out = attn.forward(q, m.clone(), m, None);
        assert_eq!(out.context.dims(), [5, 3, 8]);
        assert_eq!(out.weights.dims(), [3, 2, 5, 2]);
    }

    #[test]
    fn test_causal_mask_layout() {
        let mask: Vec<bool> = causal_mask::<TestBackend>(3, &Default::default())
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(mask, vec![false, true, true, false, false, true, false, false, false]);
    }

    #[test]
    fn test_causal_weights_are_exactly_zero() {
        let device = Default::default();
        let (len, batch, heads) = (6, 2, 2);
        let attn = block(8, heads);
        let x = Tensor::<TestBackend, 3>::random([len, batch, 8], Distribution::Default, &device);
        let mask = self_attention_mask::<TestBackend>(None, batch, len, &device);
        let w: Vec<f32> = attn
            .forward(x.clone(), x.clone(), x, Some(mask))
            .weights
            .into_data()
            .to_vec()
            .unwrap();

        for b in 0..batch {
            for h in 0..heads {
                for i in 0..len {
                    let row = &w[((b * heads + h) * len + i) * len..][..len];
                    for (j, &wij) in row.iter().enumerate() {
                        if j > i {
                            assert_eq!(wij, 0.0, "query {i} attends to future key {j}");
                        }
                    }
                    let total: f32 = row.iter().sum();
                    assert!((total - 1.0).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_self_attention_padding_weights_are_exactly_zero() {
        let device = Default::default();
        let (len, heads) = (5, 2);
        let attn = block(8, heads);
        let x = Tensor::<TestBackend, 3>::random([len, 2, 8], Distribution::Default, &device);
        let pad = padding(&[
            &[false, false, false, true, true],
            &[false, false, false, false, false],
        ]);
        let mask = self_attention_mask(Some(pad), 2, len, &device);
        let w: Vec<f32> = attn
            .forward(x.clone(), x.clone(), x, Some(mask))
            .weights
            .into_data()
            .to_vec()
            .unwrap();

        // Batch item 0: keys 3 and 4 are padding for every query
        for h in 0..heads {
            for i in 0..len {
                let row = &w[(h * len + i) * len..][..len];
                assert_eq!(row[3], 0.0);
                assert_eq!(row[4], 0.0);
            }
        }
    }

    #[test]
    fn test_cross_attention_padding_weights_are_exactly_zero() {
        let device = Default::default();
        let (q_len, mem_len, heads) = (4, 3, 4);
        let attn = block(8, heads);
        let target = Tensor::<TestBackend, 3>::random([q_len, 1, 8], Distribution::Default, &device);
        let memory = Tensor::<TestBackend, 3>::random([mem_len, 1, 8], Distribution::Default, &device);
        let mask = cross_attention_mask(padding(&[&[false, true, false]]), q_len);
        let w: Vec<f32> = attn
            .forward(target, memory.clone(), memory, Some(mask))
            .weights
            .into_data()
            .to_vec()
            .unwrap();

        for h in 0..heads {
            for i in 0..q_len {
                let row = &w[(h * q_len + i) * mem_len..][..mem_len];
                assert_eq!(row[1], 0.0);
                // No causal restriction: later memory slots stay visible
                assert!(row[2] > 0.0);
            }
        }
    }

    #[test]
    fn test_fully_blocked_row_is_zero_not_nan() {
        let device = Default::default();
        let attn = block(4, 1);
        let x = Tensor::<TestBackend, 3>::random([2, 1, 4], Distribution::Default, &device);
        let mask = cross_attention_mask(padding(&[&[true, true]]), 2);
        let out = attn.forward(x.clone(), x.clone(), x, Some(mask));
        let w: Vec<f32> = out.weights.into_data().to_vec().unwrap();
        assert!(w.iter().all(|&v| v == 0.0));
        let ctx: Vec<f32> = out.context.into_data().to_vec().unwrap();
        assert!(ctx.iter().all(|v| v.is_finite()));
    }
}
