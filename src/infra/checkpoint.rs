// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores autoencoder weights using Burn's
// CompactRecorder, keyed by training step.
//
// What gets saved:
//   1. Model weights (.mpk.gz file) — every learned parameter
//   2. latest_step.json             — which step was last saved
//   3. train_config.json            — window, batcher and model
//                                     settings of the run
//
// `predict` rebuilds the model from train_config.json before
// loading weights into it; `train` reads latest_step.json to
// resume an interrupted run.
//
// File naming convention:
//   checkpoints/
//     model_step_500.mpk.gz
//     model_step_1000.mpk.gz
//     latest_step.json
//     train_config.json
//     metrics.csv                ← written by MetricsLogger
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::EcgAutoencoder;

const LATEST_FILE: &str = "latest_step.json";
const CONFIG_FILE: &str = "train_config.json";

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn model_path(&self, step: usize) -> PathBuf {
        // The recorder appends its own extension.
        self.dir.join(format!("model_step_{step}"))
    }

    /// Save model weights for a given step and move the latest pointer to it.
    pub fn save_model<B: Backend>(&self, model: &EcgAutoencoder<B>, step: usize) -> Result<()> {
        let path = self.model_path(step);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(&step)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved checkpoint: step {}", step);
        Ok(())
    }

    /// Load weights into `model`. `None` picks the latest saved step.
    ///
    /// The model must have the architecture of the checkpoint.
    pub fn load_model<B: Backend>(
        &self,
        model:  EcgAutoencoder<B>,
        step:   Option<usize>,
        device: &B::Device,
    ) -> Result<(EcgAutoencoder<B>, usize)> {
        let step = match step {
            Some(s) => s,
            None => self.latest_step()?.with_context(|| {
                format!(
                    "No checkpoint in '{}'. Have you run 'train' first?",
                    self.dir.display()
                )
            })?,
        };
        let path = self.model_path(step);

        tracing::info!("Loading checkpoint from step {}", step);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;

        Ok((model.load_record(record), step))
    }

    /// Step of the most recent checkpoint, if any.
    pub fn latest_step(&self) -> Result<Option<usize>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(Some(serde_json::from_str::<usize>(&s)?))
    }

    /// Save the run configuration so `predict` can rebuild the model.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::EcgAutoencoderConfig;
    use burn::backend::NdArray;

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        let cfg = TrainConfig { n_iter: 77, n_channels: Some(3), ..Default::default() };
        ckpt.save_config(&cfg).unwrap();
        let back = ckpt.load_config().unwrap();
        assert_eq!(back.n_iter, 77);
        assert_eq!(back.n_channels, Some(3));
        assert_eq!(back.batcher, cfg.batcher);
    }

    #[test]
    fn test_latest_step_tracks_saves() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path().join("nested")).unwrap();
        let device = Default::default();
        let model: EcgAutoencoder<NdArray> = EcgAutoencoderConfig::new(1, 4, 2).init(&device);

        assert_eq!(ckpt.latest_step().unwrap(), None);
        assert!(ckpt.load_model(model.clone(), None, &device).is_err());

        ckpt.save_model(&model, 5).unwrap();
        ckpt.save_model(&model, 10).unwrap();
        assert_eq!(ckpt.latest_step().unwrap(), Some(10));

        let (_, step) = ckpt.load_model(model.clone(), None, &device).unwrap();
        assert_eq!(step, 10);
        let (_, step) = ckpt.load_model(model.clone(), Some(5), &device).unwrap();
        assert_eq!(step, 5);
        assert!(ckpt.load_model(model, Some(7), &device).is_err());
    }
}
