// ============================================================
// Layer 4 — Round-Robin Batcher
// ============================================================
// Keeps `batch_size` independent lanes. Each lane streams the
// windows of one recording; a batch takes exactly one window
// from every lane, in lane order.
//
//   lane 0: rec_17 ─ w0 w1 w2 ┊ rec_03 ─ w0 w1 ...
//   lane 1: rec_42 ─ w0 w1 w2 w3 w4 ┊ rec_08 ─ ...
//   lane 2: rec_11 ─ w0 ┊ rec_29 ─ w0 w1 ...
//            batch 0 = (l0.w0, l1.w0, l2.w0)
//
// When a lane runs out of windows it re-acquires a recording
// from the shared CorpusPool (refilling it, and starting a new
// epoch, when empty). Failed acquisitions, such as unreadable
// files, recordings below file_min_len or crops that leave too
// few beats, are logged and retried up to `max_attempts` times
// per lane, after which the batch fails with CorpusStarvation.
//
// Recording acquisition:
//   1. next staged bundle part, or next id from the pool
//      (skipped if events are wanted but the file has none)
//   2. length filter: skip if shorter than file_min_len,
//      random crop to [file_min_len, file_max_len] if longer
//   3. wrap in a fresh SegmentWindower
//
// Reference: rand crate documentation (StdRng, SliceRandom)
//            Rust Book §13 (Iterators)

use anyhow::{anyhow, bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::assembler::BatchAssembler;
use crate::data::error::PipelineError;
use crate::data::pool::CorpusPool;
use crate::data::windower::{SegmentWindower, WindowConfig};
use crate::domain::batch::Batch;
use crate::domain::recording::Recording;
use crate::domain::traits::RecordingSource;
use crate::domain::window::Window;

// ─── BatcherConfig ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Number of lanes (windows per batch)
    pub batch_size:        usize,
    pub window:            WindowConfig,
    /// Recordings shorter than this many samples are skipped
    pub file_min_len:      Option<usize>,
    /// Recordings are randomly cropped to at most this many samples
    pub file_max_len:      Option<usize>,
    /// Event columns to keep, in this order (empty = keep all)
    pub required_diseases: Vec<String>,
    /// Failed re-acquisitions per lane before giving up
    pub max_attempts:      usize,
    /// Re-acquisitions per lane after which a warning is logged
    pub warn_attempts:     usize,
    /// Parts kept from a bundle file: random in [bundle_min, bundle_max)
    pub bundle_min:        usize,
    pub bundle_max:        usize,
    pub seed:              u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size:        8,
            window:            WindowConfig::default(),
            file_min_len:      None,
            file_max_len:      None,
            required_diseases: Vec::new(),
            max_attempts:      200,
            warn_attempts:     190,
            bundle_min:        10,
            bundle_max:        20,
            seed:              0,
        }
    }
}

impl BatcherConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.window.validate()?;
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig("batch_size must be > 0".into()));
        }
        if self.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig("max_attempts must be > 0".into()));
        }
        if let (Some(min), Some(max)) = (self.file_min_len, self.file_max_len) {
            if max <= min {
                return Err(PipelineError::InvalidConfig(format!(
                    "file_max_len ({max}) must be greater than file_min_len ({min})"
                )));
            }
        }
        if self.file_max_len == Some(0) {
            return Err(PipelineError::InvalidConfig("file_max_len must be > 0".into()));
        }
        if self.bundle_min == 0 || self.bundle_max <= self.bundle_min {
            return Err(PipelineError::InvalidConfig(
                "bundle sizes must satisfy 0 < bundle_min < bundle_max".into(),
            ));
        }
        Ok(())
    }

    /// Same settings with the seed mixed with a resume step, so a
    /// resumed run does not replay the batches it already trained on.
    /// Step 0 keeps the configured seed.
    pub fn reseeded(&self, step: usize) -> Self {
        let seed = if step == 0 {
            self.seed
        } else {
            self.seed ^ (step as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        };
        Self { seed, ..self.clone() }
    }
}

// ─── RoundRobinBatcher ────────────────────────────────────────────────────────
pub struct RoundRobinBatcher<S: RecordingSource> {
    source:         S,
    config:         BatcherConfig,
    assembler:      BatchAssembler,
    pool:           CorpusPool,
    /// Remaining parts of the bundle file currently being served
    staged:         Vec<Recording>,
    /// One windower per lane; None until a recording is acquired
    lanes:          Vec<Option<SegmentWindower>>,
    rng:            StdRng,
    batches_served: usize,
}

impl<S: RecordingSource> RoundRobinBatcher<S> {
    /// List and shuffle the corpus, then give every lane a recording.
    pub fn new(source: S, config: BatcherConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let ids = source.list_recordings()?;
        if ids.is_empty() {
            return Err(PipelineError::EmptyCorpus);
        }
        tracing::info!("Found {} recordings, {} lanes", ids.len(), config.batch_size);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let pool    = CorpusPool::new(ids, &mut rng);
        let assembler = BatchAssembler::new(&config.window, config.required_diseases.clone());

        let mut batcher = Self {
            source,
            assembler,
            pool,
            staged: Vec::new(),
            lanes: Vec::with_capacity(config.batch_size),
            rng,
            batches_served: 0,
            config,
        };

        for lane in 0..batcher.config.batch_size {
            let windower = batcher
                .acquire()
                .map_err(|e| tracing::warn!("Lane {lane}: initial recording unusable: {e:#}"))
                .ok();
            batcher.lanes.push(windower);
        }

        Ok(batcher)
    }

    /// Pull one window from every lane and assemble them.
    pub fn get_batch(&mut self) -> Result<Batch, PipelineError> {
        let mut windows = Vec::with_capacity(self.lanes.len());
        for lane in 0..self.lanes.len() {
            windows.push(self.next_window(lane)?);
        }

        let batch = self.assembler.assemble(windows)?;
        self.batches_served += 1;
        Ok(batch)
    }

    /// Completed passes over the corpus
    pub fn epoch(&self) -> usize {
        self.pool.epoch()
    }

    pub fn batches_served(&self) -> usize {
        self.batches_served
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Next window of one lane, re-seeding the lane on exhaustion.
    fn next_window(&mut self, lane: usize) -> Result<Window, PipelineError> {
        let mut attempts = 0;
        loop {
            if let Some(window) = self.lanes[lane].as_mut().and_then(Iterator::next) {
                return Ok(window);
            }
            if attempts == self.config.max_attempts {
                return Err(PipelineError::CorpusStarvation { lane, attempts });
            }

            attempts += 1;
            if attempts == self.config.warn_attempts {
                tracing::warn!(
                    "Lane {lane}: {attempts} recordings in a row yielded no window",
                );
            }

            self.lanes[lane] = match self.acquire() {
                Ok(windower) => Some(windower),
                Err(e) => {
                    tracing::warn!("Lane {lane}: skipping recording: {e:#}");
                    None
                }
            };
        }
    }

    /// Take, filter and window the next recording.
    fn acquire(&mut self) -> Result<SegmentWindower> {
        let recording = self.next_recording()?;
        if self.config.window.want_events && recording.events().is_none() {
            bail!("'{}' has no event rows", recording.id());
        }
        let recording = self.fit_length(recording)?;
        Ok(SegmentWindower::new(recording, &self.config.window))
    }

    fn next_recording(&mut self) -> Result<Recording> {
        if let Some(part) = self.staged.pop() {
            return Ok(part);
        }

        if self.pool.is_empty() {
            tracing::info!("Epoch {} finished", self.pool.epoch());
            let ids = self.source.list_recordings()?;
            self.pool.refill(ids, &mut self.rng);
        }
        let id = self
            .pool
            .take()
            .ok_or_else(|| anyhow!("corpus listing returned no recordings"))?;

        let mut parts = self.source.load_bundle(&id)?;
        match parts.len() {
            0 => bail!("'{id}' contains no recordings"),
            1 => Ok(parts.remove(0)),
            _ => {
                parts.shuffle(&mut self.rng);
                let keep = self.rng.gen_range(self.config.bundle_min..self.config.bundle_max);
                if parts.len() >= keep {
                    parts.truncate(keep);
                }
                tracing::debug!("Staged {} parts of bundle '{}'", parts.len(), id);
                let first = parts.pop().ok_or_else(|| anyhow!("'{id}' is empty"))?;
                self.staged = parts;
                Ok(first)
            }
        }
    }

    /// Apply file_min_len / file_max_len to a freshly loaded recording.
    fn fit_length(&mut self, recording: Recording) -> Result<Recording> {
        let len = recording.len();

        if let Some(min) = self.config.file_min_len {
            if len < min {
                bail!(
                    "'{}' has {} samples, below file_min_len {}",
                    recording.id(),
                    len,
                    min
                );
            }
        }

        let Some(max) = self.config.file_max_len else {
            return Ok(recording);
        };
        let low      = self.config.file_min_len.unwrap_or(1).max(1);
        let crop_len = self.rng.gen_range(low..=max);

        if len <= crop_len + 1 {
            tracing::warn!(
                "'{}' has {} samples, too short for a {}-sample crop; using it whole",
                recording.id(),
                len,
                crop_len
            );
            return Ok(recording);
        }

        let start = self.rng.gen_range(0..len - crop_len - 1);
        Ok(recording.crop(start, crop_len)?)
    }
}
