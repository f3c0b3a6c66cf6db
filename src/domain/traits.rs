// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams of the system:
//
//   RecordingSource   → where recordings come from
//                       (JsonRecordingStore, in-memory test corpora)
//   SignalAutoencoder → what consumes assembled batches
//                       (AutoencoderRunner over burn)
//
// The batching pipeline only ever talks to these traits, so it
// can be tested without a filesystem or a GPU.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::batch::{Batch, Frames};
use crate::domain::recording::Recording;

// ─── RecordingSource ──────────────────────────────────────────────────────────
/// Opaque key-value store of recordings, keyed by identifier.
pub trait RecordingSource {
    /// All recording identifiers, sorted.
    fn list_recordings(&self) -> Result<Vec<String>>;

    /// Load one recording.
    fn load_recording(&self, id: &str) -> Result<Recording>;

    /// Load every recording stored under `id`.
    ///
    /// Pre-chunked corpora store several recordings per file;
    /// plain corpora hold exactly one.
    fn load_bundle(&self, id: &str) -> Result<Vec<Recording>> {
        Ok(vec![self.load_recording(id)?])
    }
}

// ─── SignalAutoencoder ────────────────────────────────────────────────────────
/// Per-step optimisation settings handed to `train_step`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepHyperParams {
    pub learning_rate: f64,
}

/// What one training step reports back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepSummary {
    /// mse + latent_l2
    pub loss:      f64,
    pub mse:       f64,
    pub latent_l2: f64,
}

/// The model collaborator of the batching pipeline.
pub trait SignalAutoencoder {
    /// One optimisation step on an assembled batch.
    fn train_step(&mut self, batch: &Batch, hyper: &StepHyperParams) -> Result<StepSummary>;

    /// Reconstruct a batch. Output has the batch's signal shape.
    fn infer(&self, batch: &Batch) -> Result<Frames>;

    /// Persist the current weights under a step number.
    fn save(&self, step: usize) -> Result<()>;

    /// Restore weights; `None` loads the latest saved step.
    /// Returns the step that was loaded.
    fn load(&mut self, step: Option<usize>) -> Result<usize>;
}
