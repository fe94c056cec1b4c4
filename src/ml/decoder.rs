// ============================================================
// Layer 5 — Transformer Decoder
// ============================================================
// DecoderLayer, fixed sub-block order (post-norm):
//
//   x = norm1(x + SelfAttn(x, x, x, causal | target padding))
//   x = norm2(x + CrossAttn(x, memory, memory, memory padding))
//   x = norm3(x + Linear2(act(Linear1(x))))
//
// DecoderStack runs `num_layers` of these against the SAME
// memory (the projected image feature), then projects
// d_model → vocab_size. It also owns the token embedding table.
//
// Reference: Vaswani et al. (2017) §3.1
//            Burn Book §3 (Building Blocks)

use burn::{
    module::Ignored,
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation,
};
use serde::{Deserialize, Serialize};

use crate::data::vocabulary::SPECIAL_TOKENS;
use crate::domain::error::{CaptionError, CaptionResult};
use crate::ml::attention::{AttentionBlock, AttentionBlockConfig};

// ─── Activation ───────────────────────────────────────────────────────────────
/// Feed-forward nonlinearity. A closed set, fixed when the layer
/// is built; there is no string lookup on the forward path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Gelu,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Relu => activation::relu(x),
            Self::Gelu => activation::gelu(x),
        }
    }
}

// ─── DecoderLayer ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct DecoderLayerConfig {
    pub d_model: usize,
    pub n_head:  usize,
    #[config(default = 2048)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
}

impl DecoderLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionResult<DecoderLayer<B>> {
        if self.d_ff == 0 {
            return Err(CaptionError::ConfigurationError(
                "feed-forward width must be positive".into(),
            ));
        }
        let attn = AttentionBlockConfig::new(self.d_model, self.n_head).with_dropout(self.dropout);
        Ok(DecoderLayer {
            self_attn:   attn.init(device)?,
            cross_attn:  attn.init(device)?,
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:       LayerNormConfig::new(self.d_model).init(device),
            norm2:       LayerNormConfig::new(self.d_model).init(device),
            norm3:       LayerNormConfig::new(self.d_model).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
            activation:  Ignored(self.activation),
        })
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    self_attn:   AttentionBlock<B>,
    cross_attn:  AttentionBlock<B>,
    ffn_linear1: Linear<B>,
    ffn_linear2: Linear<B>,
    norm1:       LayerNorm<B>,
    norm2:       LayerNorm<B>,
    norm3:       LayerNorm<B>,
    dropout:     Dropout,
    activation:  Ignored<Activation>,
}

impl<B: Backend> DecoderLayer<B> {
    /// target: [t, batch, d]; memory: [m, batch, d];
    /// self_mask: [batch, t, t]; memory_mask: [batch, t, m].
    ///
    /// Returns (transformed target, self-attention weights).
    pub fn forward(
        &self,
        target:      Tensor<B, 3>,
        memory:      Tensor<B, 3>,
        self_mask:   Tensor<B, 3, Bool>,
        memory_mask: Option<Tensor<B, 3, Bool>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let attn = self.self_attn.forward(
            target.clone(), target.clone(), target.clone(), Some(self_mask),
        );
        let x = self.norm1.forward(target + self.dropout.forward(attn.context));

        let cross = self.cross_attn.forward(x.clone(), memory.clone(), memory, memory_mask);
        let x = self.norm2.forward(x + self.dropout.forward(cross.context));

        let hidden = self.activation.apply(self.ffn_linear1.forward(x.clone()));
        let ffn_out = self.ffn_linear2.forward(self.dropout.forward(hidden));
        let x = self.norm3.forward(x + self.dropout.forward(ffn_out));

        (x, attn.weights)
    }
}

// ─── DecoderStack ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct DecoderStackConfig {
    pub vocab_size: usize,
    pub d_model:    usize,
    pub n_head:     usize,
    pub num_layers: usize,
    #[config(default = 2048)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
}

impl DecoderStackConfig {
    /// Validates the whole configuration before allocating any tensor.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionResult<DecoderStack<B>> {
        if self.num_layers < 1 {
            return Err(CaptionError::ConfigurationError(
                "decoder stack needs at least one layer".into(),
            ));
        }
        if self.vocab_size < SPECIAL_TOKENS.len() {
            return Err(CaptionError::ConfigurationError(format!(
                "vocab_size {} cannot hold the {} special tokens",
                self.vocab_size,
                SPECIAL_TOKENS.len()
            )));
        }
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

        let layer_cfg = DecoderLayerConfig::new(self.d_model, self.n_head)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout)
            .with_activation(self.activation);
        let layers = (0..self.num_layers)
            .map(|_| layer_cfg.init(device))
            .collect::<CaptionResult<Vec<_>>>()?;

        tracing::debug!(
            "Decoder stack ready: {} layers, d_model={}, heads={}, vocab={}",
            self.num_layers, self.d_model, self.n_head, self.vocab_size
        );

        Ok(DecoderStack {
            embedding: EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            layers,
            output:    LinearConfig::new(self.d_model, self.vocab_size).init(device),
            d_model:   self.d_model,
        })
    }
}

#[derive(Module, Debug)]
pub struct DecoderStack<B: Backend> {
    embedding: Embedding<B>,
    layers:    Vec<DecoderLayer<B>>,
    output:    Linear<B>,
    d_model:   usize,
}

pub struct DecoderStackOutput<B: Backend> {
    /// [t, batch, vocab_size], unnormalised
    pub logits: Tensor<B, 3>,
    /// Self-attention weights of each layer, [batch, heads, t, t]
    pub self_attention: Vec<Tensor<B, 4>>,
}

impl<B: Backend> DecoderStack<B> {
    /// tokens: [t, batch] → embeddings [t, batch, d_model],
    /// scaled by √d_model.
    pub fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.embedding
            .forward(tokens)
            .mul_scalar((self.d_model as f32).sqrt())
    }

    pub fn forward(
        &self,
        target:      Tensor<B, 3>,
        memory:      Tensor<B, 3>,
        self_mask:   Tensor<B, 3, Bool>,
        memory_mask: Option<Tensor<B, 3, Bool>>,
    ) -> DecoderStackOutput<B> {
        let mut x = target;
        let mut self_attention = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (out, weights) =
                layer.forward(x, memory.clone(), self_mask.clone(), memory_mask.clone());
            x = out;
            self_attention.push(weights);
        }
        DecoderStackOutput { logits: self.output.forward(x), self_attention }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}
