use burn::{
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::data::vocabulary::PAD_ID;
use crate::domain::error::{CaptionError, CaptionResult};
use crate::ml::attention::self_attention_mask;
use crate::ml::decoder::{Activation, DecoderStack, DecoderStackConfig};
use crate::ml::positional::{PositionalEncoding, PositionalEncodingConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; adding them again gives conflicting impls.
#[derive(Config, Debug)]
pub struct CaptioningModelConfig {
    /// Width of the backbone feature vector
    pub feature_width: usize,
    pub vocab_size:    usize,
    #[config(default = 256)]
    pub d_model: usize,
    #[config(default = 8)]
    pub n_head: usize,
    #[config(default = 3)]
    pub num_layers: usize,
    #[config(default = 1024)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Longest token sequence the positional table supports
    #[config(default = 64)]
    pub max_seq_length: usize,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
}

impl CaptioningModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionResult<CaptioningModel<B>> {
        if self.feature_width == 0 {
            return Err(CaptionError::ConfigurationError(
                "feature_width must be positive".into(),
            ));
        }
        let decoder = DecoderStackConfig::new(
            self.vocab_size, self.d_model, self.n_head, self.num_layers,
        )
        .with_d_ff(self.d_ff)
        .with_dropout(self.dropout)
        .with_activation(self.activation)
        .init(device)?;

        let positional = PositionalEncodingConfig::new(self.d_model)
            .with_max_len(self.max_seq_length)
            .with_dropout(self.dropout)
            .init(device)?;

        Ok(CaptioningModel {
            feature_proj:   LinearConfig::new(self.feature_width, self.d_model).init(device),
            positional,
            decoder,
            feature_width:  self.feature_width,
            vocab_size:     self.vocab_size,
        })
    }
}

#[derive(Module, Debug)]
pub struct CaptioningModel<B: Backend> {
    pub feature_proj:  Linear<B>,
    pub positional:    PositionalEncoding<B>,
    pub decoder:       DecoderStack<B>,
    pub feature_width: usize,
    pub vocab_size:    usize,
}

impl<B: Backend> CaptioningModel<B> {
    /// features: [batch, feature_width] → memory [1, batch, d_model]
    pub fn encode_image(&self, features: Tensor<B, 2>) -> CaptionResult<Tensor<B, 3>> {
        let [_, width] = features.dims();
        if width != self.feature_width {
            return Err(CaptionError::ShapeMismatch(format!(
                "backbone features have width {width}, projection expects {}",
                self.feature_width
            )));
        }
        Ok(self.feature_proj.forward(features).unsqueeze::<3>())
    }

    /// features:       [batch, feature_width]
    /// tokens:         [t, batch]
    /// target_padding: [batch, t], true = padding
    /// → logits        [t, batch, vocab_size]
    pub fn forward(
        &self,
        features:       Tensor<B, 2>,
        tokens:         Tensor<B, 2, Int>,
        target_padding: Option<Tensor<B, 2, Bool>>,
    ) -> CaptionResult<Tensor<B, 3>> {
        let [t, batch] = tokens.dims();
        let [feature_batch, _] = features.dims();
        if feature_batch != batch {
            return Err(CaptionError::ShapeMismatch(format!(
                "{feature_batch} feature rows for a token batch of {batch}"
            )));
        }
        if let Some(padding) = &target_padding {
            if padding.dims() != [batch, t] {
                return Err(CaptionError::ShapeMismatch(format!(
                    "padding mask {:?} does not match tokens [{t}, {batch}] (expected [{batch}, {t}])",
                    padding.dims()
                )));
            }
        }

        let device = tokens.device();
        let memory = self.encode_image(features)?;
        let target = self.positional.forward(self.decoder.embed(tokens))?;
        let self_mask = self_attention_mask(target_padding, batch, t, &device);

        Ok(self.decoder.forward(target, memory, self_mask, None).logits)
    }

    /// Teacher-forced cross-entropy; `<pad>` targets are ignored.
    /// targets: [t, batch] → (scalar loss, logits [t, batch, vocab])
    pub fn forward_loss(
        &self,
        features:       Tensor<B, 2>,
        inputs:         Tensor<B, 2, Int>,
        targets:        Tensor<B, 2, Int>,
        target_padding: Option<Tensor<B, 2, Bool>>,
    ) -> CaptionResult<(Tensor<B, 1>, Tensor<B, 3>)> {
        if inputs.dims() != targets.dims() {
            return Err(CaptionError::ShapeMismatch(format!(
                "inputs {:?} and targets {:?} differ",
                inputs.dims(),
                targets.dims()
            )));
        }
        let logits = self.forward(features, inputs, target_padding)?;
        let [t, batch, vocab] = logits.dims();

        let ce = CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![PAD_ID as usize]))
            .init(&logits.device());
        let loss = ce.forward(
            logits.clone().reshape([t * batch, vocab]),
            targets.reshape([t * batch]),
        );
        Ok((loss, logits))
    }

    pub fn max_seq_length(&self) -> usize {
        self.positional.max_len()
    }
}
