// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration        (Layer 2)
//   Step 2: Open the recording corpus         (Layer 4 - data)
//   Step 3: Open the checkpoint directory     (Layer 6 - infra)
//   Step 4: Run the step loop                 (Layer 5 - ml)
//
// The loop itself saves the configuration once the channel
// count is known, so `predict` can rebuild the same model.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::batcher::BatcherConfig;
use crate::data::loader::JsonRecordingStore;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::EcgAutoencoderConfig;
use crate::ml::trainer::{run_training, TrainReport};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings of a training run. Serialisable so it can be
// saved next to the checkpoints and reloaded for prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:        String,
    pub checkpoint_dir:  String,
    /// Lanes, windowing, length filter and label selection
    pub batcher:         BatcherConfig,
    /// Filled in from the first batch when not given
    pub n_channels:      Option<usize>,
    pub hidden:          usize,
    pub dropout:         f64,
    pub use_true_inputs: bool,
    /// Train on the delta-coded signal instead of the raw one
    pub use_delta:       bool,
    pub n_iter:          usize,
    pub save_every:      usize,
    pub log_every:       usize,
    /// Learning rate of the first step
    pub lr:              f64,
    /// Learning rate of the last step; None keeps `lr` constant
    #[serde(default)]
    pub lr_end:          Option<f64>,
    pub weight_decay:    f64,
    /// Batches kept ready by the background producer (0 = inline)
    pub prefetch:        usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:        "data/recordings".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            batcher:         BatcherConfig::default(),
            n_channels:      None,
            hidden:          128,
            dropout:         0.0,
            use_true_inputs: true,
            use_delta:       false,
            n_iter:          10_000,
            save_every:      500,
            log_every:       50,
            lr:              1e-3,
            lr_end:          None,
            weight_decay:    0.0,
            prefetch:        0,
        }
    }
}

impl TrainConfig {
    /// Request exactly the signal tensor the model trains on.
    pub fn with_signal(mut self, use_delta: bool) -> Self {
        self.use_delta = use_delta;
        self.batcher.window.want_raw   = !use_delta;
        self.batcher.window.want_delta = use_delta;
        self
    }

    pub fn model_config(&self, n_channels: usize) -> EcgAutoencoderConfig {
        EcgAutoencoderConfig::new(n_channels, self.hidden, self.batcher.window.reduction_ratio)
            .with_dropout(self.dropout)
            .with_use_true_inputs(self.use_true_inputs)
    }

    /// Learning rate of the 1-based `step`.
    ///
    /// Power decay `lr / step^b` with `b = log_{n_iter}(lr / lr_end)`,
    /// which starts at `lr` on step 1 and reaches `lr_end` on step `n_iter`.
    pub fn lr_at(&self, step: usize) -> f64 {
        let Some(end) = self.lr_end else {
            return self.lr;
        };
        if self.n_iter < 2 {
            return self.lr;
        }
        let b = (self.lr / end).ln() / (self.n_iter as f64).ln();
        self.lr / (step.max(1) as f64).powf(b)
    }

    pub fn validate(&self) -> Result<()> {
        self.batcher.validate()?;
        let window = &self.batcher.window;
        let produced = if self.use_delta { window.want_delta } else { window.want_raw };
        if !produced {
            bail!("the window configuration does not produce the signal the model trains on");
        }
        // Channel count is not known yet; 1 stands in for the check.
        self.model_config(self.n_channels.unwrap_or(1)).validate()?;
        if self.n_iter == 0 {
            bail!("n_iter must be > 0");
        }
        if !(self.lr > 0.0) {
            bail!("lr must be > 0");
        }
        if matches!(self.lr_end, Some(end) if !(end > 0.0)) {
            bail!("lr_end must be > 0");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout must be in [0, 1)");
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(mut self) -> Result<TrainReport> {
        // ── Step 1: Validate ──────────────────────────────────────────────────
        self.config.validate()?;
        let cfg = &mut self.config;

        // ── Step 2: Corpus ────────────────────────────────────────────────────
        tracing::info!("Reading recordings from '{}'", cfg.data_dir);
        let store = JsonRecordingStore::new(&cfg.data_dir);

        // ── Step 3: Checkpoints ───────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;

        // ── Step 4: Train (Layer 5) ───────────────────────────────────────────
        run_training(cfg, store, ckpt_manager)
    }
}
