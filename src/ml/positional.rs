// ============================================================
// Layer 5 — Sinusoidal Positional Encoding
// ============================================================
// Attention is permutation-invariant, so position has to be
// added to the token embeddings explicitly:
//
//   pe[p, 2i]   = sin(p / 10000^(2i / d_model))
//   pe[p, 2i+1] = cos(p / 10000^(2i / d_model))
//
// The table is computed once for `max_len` positions at
// construction and sliced per call. It is a constant, not a
// learned parameter, and depends only on (position, feature).
//
// Reference: Vaswani et al. (2017) §3.5

use burn::{
    nn::{Dropout, DropoutConfig},
    prelude::*,
};

use crate::domain::error::{CaptionError, CaptionResult};

#[derive(Config, Debug)]
pub struct PositionalEncodingConfig {
    pub d_model: usize,
    #[config(default = 512)]
    pub max_len: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl PositionalEncodingConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionResult<PositionalEncoding<B>> {
        if self.d_model == 0 || self.max_len == 0 {
            return Err(CaptionError::ConfigurationError(format!(
                "positional encoding needs d_model > 0 and max_len > 0, got {} and {}",
                self.d_model, self.max_len
            )));
        }
        let values = sinusoid_table(self.max_len, self.d_model);
        let table = Tensor::<B, 2>::from_data(
            TensorData::new(values, [self.max_len, self.d_model]),
            device,
        );
        Ok(PositionalEncoding {
            table,
            dropout: DropoutConfig::new(self.dropout).init(),
            max_len: self.max_len,
            d_model: self.d_model,
        })
    }
}

/// Row-major `[max_len, d_model]` sinusoid values.
pub fn sinusoid_table(max_len: usize, d_model: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(max_len * d_model);
    for pos in 0..max_len {
        for j in 0..d_model {
            let pair  = (j / 2 * 2) as f64;
            let angle = pos as f64 / 10_000f64.powf(pair / d_model as f64);
            let v = if j % 2 == 0 { angle.sin() } else { angle.cos() };
            values.push(v as f32);
        }
    }
    values
}

#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    table:   Tensor<B, 2>,
    dropout: Dropout,
    max_len: usize,
    d_model: usize,
}

impl<B: Backend> PositionalEncoding<B> {
    /// x: [positions, batch, d_model] → same shape, `x + pe`.
    pub fn forward(&self, x: Tensor<B, 3>) -> CaptionResult<Tensor<B, 3>> {
        let [positions, batch, width] = x.dims();
        if width != self.d_model {
            return Err(CaptionError::ShapeMismatch(format!(
                "positional encoding expects width {}, got {width}",
                self.d_model
            )));
        }
        if positions > self.max_len {
            return Err(CaptionError::InvalidInput(format!(
                "sequence of {positions} positions exceeds the encoding table ({})",
                self.max_len
            )));
        }

        let pe = self
            .table
            .clone()
            .slice([0..positions, 0..width])
            .unsqueeze_dim::<3>(1)
            .expand([positions, batch, width]);
        Ok(self.dropout.forward(x + pe))
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_table_values() {
        let t = sinusoid_table(3, 4);
        // Position 0: sin(0)=0, cos(0)=1
        assert_eq!(&t[0..4], &[0.0, 1.0, 0.0, 1.0]);
        // Position 1, pair 0: sin(1), cos(1)
        assert!((t[4] - 1f32.sin()).abs() < 1e-6);
        assert!((t[5] - 1f32.cos()).abs() < 1e-6);
        // Position 2, pair 1: angle = 2 / 10000^(2/4) = 0.02
        assert!((t[10] - 0.02f32.sin()).abs() < 1e-6);
        assert!((t[11] - 0.02f32.cos()).abs() < 1e-6);
    }

    #[test]
    fn test_zero_input_yields_same_signal_for_every_batch_item() {
        let device = Default::default();
        let pe = PositionalEncodingConfig::new(6)
            .with_max_len(10)
            .init::<TestBackend>(&device)
            .unwrap();

        let out = pe.forward(Tensor::zeros([5, 3, 6], &device)).unwrap();
        let values: Vec<f32> = out.into_data().to_vec().unwrap();
        let table = sinusoid_table(10, 6);
        for p in 0..5 {
            for b in 0..3 {
                let row = &values[(p * 3 + b) * 6..(p * 3 + b + 1) * 6];
                assert_eq!(row, &table[p * 6..(p + 1) * 6]);
            }
        }
    }

    #[test]
    fn test_signal_is_independent_of_content() {
        let device = Default::default();
        let pe = PositionalEncodingConfig::new(4)
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::<TestBackend, 3>::random([7, 2, 4], Distribution::Default, &device);
        let diff = pe.forward(x.clone()).unwrap() - x;
        let zeros = pe.forward(Tensor::zeros([7, 2, 4], &device)).unwrap();
        let diff: Vec<f32> = diff.into_data().to_vec().unwrap();
        let zeros: Vec<f32> = zeros.into_data().to_vec().unwrap();
        for (a, b) in diff.iter().zip(&zeros) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rejects_too_long_sequence() {
        let device = Default::default();
        let pe = PositionalEncodingConfig::new(4)
            .with_max_len(3)
            .init::<TestBackend>(&device)
            .unwrap();
        let err = pe.forward(Tensor::zeros([4, 1, 4], &device)).unwrap_err();
        assert!(matches!(err, CaptionError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_wrong_width() {
        let device = Default::default();
        let pe = PositionalEncodingConfig::new(4).init::<TestBackend>(&device).unwrap();
        let err = pe.forward(Tensor::zeros([2, 1, 8], &device)).unwrap_err();
        assert!(matches!(err, CaptionError::ShapeMismatch(_)));
    }
}
