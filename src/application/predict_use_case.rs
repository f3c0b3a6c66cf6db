// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Reconstructs every beat of one recording with a trained
// checkpoint and writes the result as JSON.
//
//   recording
//       │  optional: ChunkSplitter (n_chunks, chunk_overlap)
//       ▼
//   part 0, part 1, ...
//       │  SegmentWindower with overlap = 0
//       ▼
//   windows ── grouped into batches of `lanes` ──► infer()
//       │
//       ▼
//   per-beat reconstructions, cropped to the true beat length
//       │  ChunkJoiner (drops beats shared with the previous chunk)
//       ▼
//   one entry per beat of the recording
//
// The windower leaves the last beats of each part uncovered;
// those entries are null in the output.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::data::assembler::BatchAssembler;
use crate::data::chunker::ChunkSplitter;
use crate::data::loader::JsonRecordingStore;
use crate::data::windower::{SegmentWindower, WindowConfig};
use crate::domain::recording::Recording;
use crate::domain::traits::{RecordingSource, SignalAutoencoder};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::tensors;
use crate::ml::trainer;

/// Reconstruction of one beat: `[channel][sample]`
pub type BeatSignal = Vec<Vec<f32>>;

/// Output file of `predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id:         String,
    /// "raw" or "delta"
    pub signal:     String,
    pub step:       usize,
    pub n_channels: usize,
    /// One entry per beat boundary, null where no window covered the beat
    pub beats:      Vec<Option<BeatSignal>>,
}

#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub input:          PathBuf,
    pub output:         PathBuf,
    pub checkpoint_dir: PathBuf,
    pub step:           Option<usize>,
    /// 0 = do not chunk
    pub n_chunks:       usize,
    pub chunk_overlap:  usize,
    /// Windows per inference batch
    pub lanes:          usize,
}

pub struct PredictUseCase {
    request: PredictRequest,
}

impl PredictUseCase {
    pub fn new(request: PredictRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<Prediction> {
        let req  = &self.request;
        let ckpt = CheckpointManager::new(&req.checkpoint_dir)?;
        let cfg  = ckpt.load_config()?;
        let n_channels = cfg
            .n_channels
            .context("train_config.json does not record the channel count")?;

        // ── Model ─────────────────────────────────────────────────────────────
        let (runner, step) = trainer::load_autoencoder(&cfg, n_channels, ckpt, req.step)?;

        // ── Recording ─────────────────────────────────────────────────────────
        let store = JsonRecordingStore::new(req.input.parent().unwrap_or(req.input.as_path()));
        let recording = store.load_recording(&req.input.display().to_string())?;
        if recording.n_channels() != n_channels {
            bail!(
                "'{}' has {} channels, the model expects {}",
                recording.id(),
                recording.n_channels(),
                n_channels
            );
        }
        tracing::info!(
            "Reconstructing '{}': {} beats, {} samples",
            recording.id(),
            recording.num_beats(),
            recording.len()
        );

        let window = prediction_window(&cfg.batcher.window, cfg.use_delta);
        let chunking = (req.n_chunks > 0).then_some((req.n_chunks, req.chunk_overlap));
        let beats = reconstruct_recording(&runner, &recording, &window, req.lanes, cfg.use_delta, chunking)?;

        let covered = beats.iter().filter(|b| b.is_some()).count();
        tracing::info!("Reconstructed {} of {} beats", covered, beats.len());

        let prediction = Prediction {
            id:     recording.id().to_string(),
            signal: if cfg.use_delta { "delta" } else { "raw" }.to_string(),
            step,
            n_channels,
            beats,
        };
        let json = serde_json::to_string(&prediction)?;
        fs::write(&req.output, json)
            .with_context(|| format!("Cannot write '{}'", req.output.display()))?;

        Ok(prediction)
    }
}

/// Training windows without lookback, producing only the model's signal.
pub fn prediction_window(train: &WindowConfig, use_delta: bool) -> WindowConfig {
    WindowConfig {
        overlap:     0,
        want_raw:    !use_delta,
        want_delta:  use_delta,
        want_events: false,
        ..train.clone()
    }
}

/// Reconstruct every beat of `recording`, optionally chunk by chunk.
pub fn reconstruct_recording<M: SignalAutoencoder>(
    model:     &M,
    recording: &Recording,
    window:    &WindowConfig,
    lanes:     usize,
    use_delta: bool,
    chunking:  Option<(usize, usize)>,
) -> Result<Vec<Option<BeatSignal>>> {
    let Some((n_chunks, overlap)) = chunking else {
        return reconstruct_beats(model, recording, window, lanes, use_delta);
    };

    let splitter = ChunkSplitter::new(n_chunks, overlap);
    let mut results = Vec::with_capacity(n_chunks);
    for chunk in splitter.split(recording)? {
        let part = match chunk.to_recording() {
            Ok(part) => reconstruct_beats(model, &part, window, lanes, use_delta)?,
            Err(e) => {
                tracing::debug!("Chunk {} not reconstructed: {}", chunk.index, e);
                vec![None; chunk.num_beats()]
            }
        };
        results.push(part);
    }
    Ok(splitter.joiner().join(recording, results)?)
}

/// One entry per beat boundary of `recording`.
pub fn reconstruct_beats<M: SignalAutoencoder>(
    model:     &M,
    recording: &Recording,
    window:    &WindowConfig,
    lanes:     usize,
    use_delta: bool,
) -> Result<Vec<Option<BeatSignal>>> {
    let mut out: Vec<Option<BeatSignal>> = vec![None; recording.num_beats()];
    let assembler = BatchAssembler::new(window, Vec::new());
    let per_window = window.beats_per_window();

    let mut windows = SegmentWindower::new(recording.clone(), window).peekable();
    while windows.peek().is_some() {
        let group: Vec<_> = windows.by_ref().take(lanes.max(1)).collect();
        let starts: Vec<usize> = group.iter().map(|w| w.start_beat).collect();

        let batch = assembler.assemble(group)?;
        let reconstruction = model.infer(&batch)?;

        let expected = tensors::signal(&batch, use_delta)?.shape();
        if reconstruction.shape() != expected {
            bail!(
                "model returned shape {:?} for input {:?}",
                reconstruction.shape(),
                expected
            );
        }

        for (lane, start) in starts.into_iter().enumerate() {
            for k in 0..per_window {
                let row = lane * per_window + k;
                out[start + k] = Some(reconstruction.row_channels(row, batch.true_length[row]));
            }
        }
    }
    Ok(out)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::beat_recording;
    use crate::domain::batch::{Batch, Frames};
    use crate::domain::traits::{StepHyperParams, StepSummary};
    use std::cell::Cell;

    /// Returns its input unchanged and counts calls.
    #[derive(Default)]
    struct Identity {
        calls: Cell<usize>,
    }

    impl SignalAutoencoder for Identity {
        fn train_step(&mut self, _: &Batch, _: &StepHyperParams) -> Result<StepSummary> {
            Ok(StepSummary { loss: 0.0, mse: 0.0, latent_l2: 0.0 })
        }

        fn infer(&self, batch: &Batch) -> Result<Frames> {
            self.calls.set(self.calls.get() + 1);
            Ok(tensors::signal(batch, false)?.clone())
        }

        fn save(&self, _: usize) -> Result<()> {
            Ok(())
        }

        fn load(&mut self, _: Option<usize>) -> Result<usize> {
            Ok(0)
        }
    }

    fn window() -> WindowConfig {
        prediction_window(
            &WindowConfig { n_frames: 4, overlap: 3, reduction_ratio: 4, ..Default::default() },
            false,
        )
    }

    #[test]
    fn test_identity_reconstruction_returns_each_beat() {
        let rec   = beat_recording("r", 30, 7, 2.0);
        let model = Identity::default();
        let beats = reconstruct_beats(&model, &rec, &window(), 3, false).unwrap();

        // overlap 0: (30 / 4) - 1 = 6 windows → beats 0..24 covered
        assert_eq!(beats.len(), 30);
        assert!(beats[..24].iter().all(Option::is_some));
        assert!(beats[24..].iter().all(Option::is_none));
        assert_eq!(model.calls.get(), 2);

        let b5 = beats[5].as_ref().unwrap();
        assert_eq!(b5.len(), 2);
        assert_eq!(b5[0].len(), 7);
        assert_eq!(b5[0][0], 35.0);
        assert!(b5[1].iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_chunked_reconstruction_covers_recording() {
        let rec   = beat_recording("r", 400, 10, 1.0);
        let model = Identity::default();
        let beats =
            reconstruct_recording(&model, &rec, &window(), 4, false, Some((4, 150))).unwrap();
        assert_eq!(beats.len(), 400);

        // every reconstructed beat is the original signal of that beat
        for (b, beat) in beats.iter().enumerate() {
            if let Some(signal) = beat {
                assert_eq!(signal[0][0], (b * 10) as f32, "beat {b}");
                assert_eq!(signal[0].len(), 10);
            }
        }
        assert!(beats.iter().filter(|b| b.is_some()).count() > 300);
    }

    #[test]
    fn test_prediction_window_drops_overlap_and_events() {
        let train = WindowConfig { overlap: 5, want_events: true, ..Default::default() };
        let w = prediction_window(&train, true);
        assert_eq!(w.overlap, 0);
        assert!(w.want_delta && !w.want_raw && !w.want_events);
        assert_eq!(w.n_frames, train.n_frames);
    }

    #[test]
    fn test_prediction_serialises_uncovered_beats_as_null() {
        let p = Prediction {
            id:         "r".into(),
            signal:     "raw".into(),
            step:       3,
            n_channels: 1,
            beats:      vec![Some(vec![vec![1.0]]), None],
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains(r#""beats":[[[1.0]],null]"#));
    }
}
