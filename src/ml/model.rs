// ============================================================
// Layer 5 — ECG Window Autoencoder
// ============================================================
// Compresses a window of beats into one latent vector Z and
// reconstructs every beat from it.
//
//   beats [N, L, C]                       N = windows * F beats
//     │  conv1d ×log2(rr)  (k=2, s=2)     L/rr steps of W features
//     ▼
//   frame GRU ── step seq_len/rr - 1 ──► frame embedding E [N, H]
//     │  reshape [B, F, H]
//     ▼
//   window GRU ── last step ──► Z [B, H]
//     │
//     ▼
//   decoder GRU (state Z, inputs E shifted right) ──► Ê [N, H]
//     │
//     ▼
//   decompress GRU (state Ê, inputs conv features shifted right)
//     │  linear H → W, conv-transpose ×log2(rr)
//     ▼
//   reconstruction [N, L, C]
//
// Loss = MSE(input, reconstruction) + mean(Z²)
//
// When `use_true_inputs` is false both decoders read zeros
// instead of the shifted ground truth.
//
// Reference: Burn Book §3 (Building Blocks)
//            Cho et al. (2014) GRU encoder-decoder

use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig, ConvTranspose1d, ConvTranspose1dConfig},
        gru::{Gru, GruConfig},
        loss::{MseLoss, Reduction},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

/// Channel width of the first conv layer; doubles per layer.
const BASE_WIDTH: usize = 16;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct EcgAutoencoderConfig {
    pub n_channels:      usize,
    pub hidden:          usize,
    /// Beat length reduction of the conv stack; a power of two ≥ 2
    pub reduction_ratio: usize,
    #[config(default = 0.0)]
    pub dropout:         f64,
    #[config(default = true)]
    pub use_true_inputs: bool,
}

impl EcgAutoencoderConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reduction_ratio < 2 || !self.reduction_ratio.is_power_of_two() {
            anyhow::bail!(
                "reduction_ratio must be a power of two >= 2, got {}",
                self.reduction_ratio
            );
        }
        if self.n_channels == 0 || self.hidden == 0 {
            anyhow::bail!("n_channels and hidden must be > 0");
        }
        Ok(())
    }

    /// Conv layer count: log2(reduction_ratio)
    pub fn n_layers(&self) -> usize {
        self.reduction_ratio.trailing_zeros() as usize
    }

    fn widths(&self) -> Vec<usize> {
        (0..self.n_layers()).map(|i| BASE_WIDTH << i).collect()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> EcgAutoencoder<B> {
        let widths = self.widths();
        let feat   = widths.last().copied().unwrap_or(self.n_channels);

        let compress = widths
            .iter()
            .enumerate()
            .map(|(i, &out)| {
                let input = if i == 0 { self.n_channels } else { widths[i - 1] };
                Conv1dConfig::new(input, out, 2).with_stride(2).init(device)
            })
            .collect();

        // Mirror of `compress`, applied last layer first.
        let expand = (0..widths.len())
            .rev()
            .map(|i| {
                let out = if i == 0 { self.n_channels } else { widths[i - 1] };
                ConvTranspose1dConfig::new([widths[i], out], 2)
                    .with_stride(2)
                    .init(device)
            })
            .collect();

        EcgAutoencoder {
            compress,
            frame_rnn:       GruConfig::new(feat, self.hidden, true).init(device),
            window_rnn:      GruConfig::new(self.hidden, self.hidden, true).init(device),
            decoder_rnn:     GruConfig::new(self.hidden, self.hidden, true).init(device),
            decompress_rnn:  GruConfig::new(feat, self.hidden, true).init(device),
            to_features:     LinearConfig::new(self.hidden, feat).init(device),
            expand,
            dropout:         DropoutConfig::new(self.dropout).init(),
            reduction_ratio: self.reduction_ratio,
            use_true_inputs: self.use_true_inputs,
        }
    }
}

#[derive(Module, Debug)]
pub struct EcgAutoencoder<B: Backend> {
    pub compress:        Vec<Conv1d<B>>,
    pub frame_rnn:       Gru<B>,
    pub window_rnn:      Gru<B>,
    pub decoder_rnn:     Gru<B>,
    pub decompress_rnn:  Gru<B>,
    pub to_features:     Linear<B>,
    pub expand:          Vec<ConvTranspose1d<B>>,
    pub dropout:         Dropout,
    pub reduction_ratio: usize,
    pub use_true_inputs: bool,
}

pub struct AutoencoderOutput<B: Backend> {
    /// [N, L, C]
    pub reconstruction: Tensor<B, 3>,
    /// [windows, H]
    pub latent:         Tensor<B, 2>,
}

/// Loss terms of one forward pass.
pub struct AutoencoderLoss<B: Backend> {
    pub total:     Tensor<B, 1>,
    pub mse:       Tensor<B, 1>,
    pub latent_l2: Tensor<B, 1>,
}

impl<B: Backend> EcgAutoencoder<B> {
    /// beats:       [N, L, C], L a multiple of the reduction ratio
    /// frame_steps: [N], index of the last valid compressed step per beat
    /// frames:      beats per window; N must be a multiple of it
    pub fn forward(
        &self,
        beats:       Tensor<B, 3>,
        frame_steps: Tensor<B, 1, Int>,
        frames:      usize,
    ) -> AutoencoderOutput<B> {
        let [n, _, _] = beats.dims();
        let windows   = n / frames;

        // ── Encode ────────────────────────────────────────────────────────────
        let features = self.compress_beats(beats);            // [N, T, W]
        let [_, steps, width] = features.dims();

        let frame_states = self.frame_rnn.forward(features.clone(), None);
        let hidden = frame_states.dims()[2];
        let index  = frame_steps
            .reshape([n, 1, 1])
            .expand([n, 1, hidden]);
        let embeddings = frame_states.gather(1, index).reshape([n, hidden]);

        let per_window = embeddings.clone().reshape([windows, frames, hidden]);
        let latent = self
            .window_rnn
            .forward(per_window.clone(), None)
            .slice([0..windows, frames - 1..frames, 0..hidden])
            .reshape([windows, hidden]);

        // ── Decode ────────────────────────────────────────────────────────────
        let decoder_in = self.shifted_inputs(per_window);
        let decoded = self
            .decoder_rnn
            .forward(decoder_in, Some(latent.clone()))
            .reshape([n, hidden]);

        let decompress_in = self.shifted_inputs(features);
        let restored = self
            .decompress_rnn
            .forward(decompress_in, Some(decoded));
        let restored = self.to_features.forward(restored);    // [N, T, W]
        debug_assert_eq!(restored.dims(), [n, steps, width]);

        AutoencoderOutput {
            reconstruction: self.expand_beats(restored),
            latent,
        }
    }

    pub fn forward_loss(
        &self,
        beats:       Tensor<B, 3>,
        frame_steps: Tensor<B, 1, Int>,
        frames:      usize,
    ) -> (AutoencoderLoss<B>, AutoencoderOutput<B>) {
        let output = self.forward(beats.clone(), frame_steps, frames);

        let mse = MseLoss::new().forward(output.reconstruction.clone(), beats, Reduction::Mean);
        let latent_l2 = (output.latent.clone() * output.latent.clone()).mean();
        let total = mse.clone() + latent_l2.clone();

        (AutoencoderLoss { total, mse, latent_l2 }, output)
    }

    /// [N, L, C] → [N, L/rr, W]
    fn compress_beats(&self, beats: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = beats.swap_dims(1, 2);
        for conv in &self.compress {
            x = self.dropout.forward(gelu(conv.forward(x)));
        }
        x.swap_dims(1, 2)
    }

    /// [N, T, W] → [N, T*rr, C]
    fn expand_beats(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = features.swap_dims(1, 2);
        let last  = self.expand.len().saturating_sub(1);
        for (i, deconv) in self.expand.iter().enumerate() {
            x = deconv.forward(x);
            if i < last {
                x = gelu(x);
            }
        }
        x.swap_dims(1, 2)
    }

    /// Sequence shifted right by one step with a zero first step,
    /// or all zeros when true inputs are disabled.
    fn shifted_inputs(&self, seq: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, steps, dim] = seq.dims();
        let device = seq.device();
        if !self.use_true_inputs {
            return Tensor::zeros([batch, steps, dim], &device);
        }
        let first = Tensor::zeros([batch, 1, dim], &device);
        if steps == 1 {
            return first;
        }
        let rest = seq.slice([0..batch, 0..steps - 1, 0..dim]);
        Tensor::cat(vec![first, rest], 1)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn inputs(n: usize, len: usize, c: usize, rr: usize) -> (Tensor<TestBackend, 3>, Tensor<TestBackend, 1, Int>) {
        let device = Default::default();
        let values: Vec<f32> = (0..n * len * c).map(|i| ((i % 17) as f32 - 8.0) / 8.0).collect();
        let beats  = Tensor::from_data(TensorData::new(values, [n, len, c]), &device);
        let steps  = Tensor::from_data(TensorData::new(vec![(len / rr - 1) as i64; n], [n]), &device);
        (beats, steps)
    }

    #[test]
    fn test_reconstruction_has_input_shape() {
        let device = Default::default();
        let model: EcgAutoencoder<TestBackend> =
            EcgAutoencoderConfig::new(2, 8, 4).init(&device);
        assert_eq!(model.compress.len(), 2);
        assert_eq!(model.expand.len(), 2);

        let (beats, steps) = inputs(6, 12, 2, 4);
        let out = model.forward(beats, steps, 3);
        assert_eq!(out.reconstruction.dims(), [6, 12, 2]);
        assert_eq!(out.latent.dims(), [2, 8]);
    }

    #[test]
    fn test_loss_is_sum_of_terms() {
        let device = Default::default();
        let model: EcgAutoencoder<TestBackend> = EcgAutoencoderConfig::new(1, 4, 2)
            .with_use_true_inputs(false)
            .init(&device);

        let (beats, steps) = inputs(4, 8, 1, 2);
        let (loss, _) = model.forward_loss(beats, steps, 2);
        let total: f64 = loss.total.into_scalar().elem();
        let mse: f64   = loss.mse.into_scalar().elem();
        let l2: f64    = loss.latent_l2.into_scalar().elem();
        assert!(total.is_finite());
        assert!(mse >= 0.0 && l2 >= 0.0);
        assert!((total - (mse + l2)).abs() < 1e-5);
    }

    #[test]
    fn test_single_frame_windows() {
        let device = Default::default();
        let model: EcgAutoencoder<TestBackend> =
            EcgAutoencoderConfig::new(3, 5, 8).init(&device);
        let (beats, steps) = inputs(2, 16, 3, 8);
        let out = model.forward(beats, steps, 1);
        assert_eq!(out.reconstruction.dims(), [2, 16, 3]);
        assert_eq!(out.latent.dims(), [2, 5]);
    }

    #[test]
    fn test_validate_reduction_ratio() {
        assert!(EcgAutoencoderConfig::new(1, 4, 8).validate().is_ok());
        assert!(EcgAutoencoderConfig::new(1, 4, 6).validate().is_err());
        assert!(EcgAutoencoderConfig::new(1, 4, 1).validate().is_err());
        assert_eq!(EcgAutoencoderConfig::new(1, 4, 16).n_layers(), 4);
    }
}
