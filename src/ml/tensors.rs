// ============================================================
// Layer 5 — Batch → Tensor Conversion
// ============================================================
// Moves an assembled Batch onto a burn device.
//
//   Batch.raw / Batch.delta  [N, L, C] flat f32  → Tensor<B, 3>
//   Batch.sequence_length    [N] padded lengths  → Tensor<B, 1, Int>
//                            as last compressed step: len/rr - 1
//
// Only the signal the model was trained on is converted; the
// other one may be absent from the batch.
//
// Reference: Burn Book §4 (Batcher)

use anyhow::{anyhow, bail, Result};
use burn::{prelude::*, tensor::TensorData};

use crate::domain::batch::{Batch, Frames};

/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct ModelInput<B: Backend> {
    /// [N, L, C]
    pub beats:       Tensor<B, 3>,
    /// [N], last valid step of every beat after compression
    pub frame_steps: Tensor<B, 1, Int>,
    /// Beats per window
    pub frames:      usize,
}

impl<B: Backend> ModelInput<B> {
    pub fn from_batch(
        batch:           &Batch,
        use_delta:       bool,
        reduction_ratio: usize,
        device:          &B::Device,
    ) -> Result<Self> {
        let frames = signal(batch, use_delta)?;
        if batch.beats_per_window == 0 || frames.rows() % batch.beats_per_window != 0 {
            bail!(
                "{} beat rows do not split into windows of {}",
                frames.rows(),
                batch.beats_per_window
            );
        }
        if frames.max_len() % reduction_ratio != 0 {
            bail!(
                "beat length {} is not a multiple of the reduction ratio {}",
                frames.max_len(),
                reduction_ratio
            );
        }

        Ok(Self {
            beats:       to_tensor(frames, device),
            frame_steps: frame_steps(&batch.sequence_length, reduction_ratio, device)?,
            frames:      batch.beats_per_window,
        })
    }
}

/// The signal tensor the model consumes.
pub fn signal(batch: &Batch, use_delta: bool) -> Result<&Frames> {
    let (frames, name) = if use_delta {
        (batch.delta.as_ref(), "delta")
    } else {
        (batch.raw.as_ref(), "raw")
    };
    frames.ok_or_else(|| anyhow!("batch carries no {name} signal"))
}

pub fn to_tensor<B: Backend>(frames: &Frames, device: &B::Device) -> Tensor<B, 3> {
    Tensor::from_data(TensorData::new(frames.as_slice().to_vec(), frames.shape()), device)
}

/// Index of the last compressed step of every beat.
pub fn frame_steps<B: Backend>(
    sequence_length: &[usize],
    reduction_ratio: usize,
    device:          &B::Device,
) -> Result<Tensor<B, 1, Int>> {
    let steps = sequence_length
        .iter()
        .map(|&len| {
            if len < reduction_ratio {
                bail!("padded beat length {len} is shorter than the reduction ratio");
            }
            Ok((len / reduction_ratio - 1) as i64)
        })
        .collect::<Result<Vec<i64>>>()?;
    let n = steps.len();
    Ok(Tensor::from_data(TensorData::new(steps, [n]), device))
}

/// Copy a `[N, L, C]` tensor back to host memory.
pub fn to_frames<B: Backend>(tensor: Tensor<B, 3>) -> Result<Frames> {
    let shape = tensor.dims();
    let data  = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))?;
    Frames::from_vec(data, shape).ok_or_else(|| anyhow!("tensor data does not match shape {shape:?}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn batch() -> Batch {
        let mut raw = Frames::zeros(4, 8, 1);
        raw.set(1, 3, 0, 2.5);
        Batch {
            raw:              Some(raw),
            delta:            None,
            events:           None,
            sequence_length:  vec![4, 8, 4, 8],
            true_length:      vec![3, 7, 4, 5],
            beats_per_window: 2,
            lanes:            2,
        }
    }

    #[test]
    fn test_model_input_from_batch() {
        let device = Default::default();
        let input  = ModelInput::<NdArray>::from_batch(&batch(), false, 4, &device).unwrap();
        assert_eq!(input.beats.dims(), [4, 8, 1]);
        assert_eq!(input.frames, 2);

        let steps: Vec<i64> = input.frame_steps.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(steps, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_missing_signal_and_bad_ratio_fail() {
        let device = Default::default();
        assert!(ModelInput::<NdArray>::from_batch(&batch(), true, 4, &device).is_err());
        assert!(ModelInput::<NdArray>::from_batch(&batch(), false, 3, &device).is_err());
    }

    #[test]
    fn test_frames_survive_the_device() {
        let device = Default::default();
        let b      = batch();
        let frames = b.raw.as_ref().unwrap();
        let back   = to_frames(to_tensor::<NdArray>(frames, &device)).unwrap();
        assert_eq!(&back, frames);
    }
}
