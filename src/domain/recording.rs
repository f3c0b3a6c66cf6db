// ============================================================
// Layer 3 — Recording Domain Type
// ============================================================
// One subject's continuous multi-channel ECG signal, plus the
// beat boundaries detected on it.
//
//   channels:      [lead][sample]      equal-length f32 signals
//   beats:         [b0, b1, ..., bn]   strictly increasing sample indices
//   events:        [beat][disease]     optional per-beat labels
//   disease_names: [disease]           column names of `events`
//
// Beat `b` spans the samples [beats[b], beats[b+1]).
// The last boundary therefore only closes the previous beat.
//
//   samples: |----|-------|------|-----|----
//   beats:   b0   b1      b2     b3    b4
//
// Reference: Rust Book §5 (Structs), §9 (Recoverable Errors)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Violations of the Recording invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordingError {
    #[error("recording '{0}' has no channels")]
    NoChannels(String),

    #[error("recording '{id}': channel {channel} has {found} samples, expected {expected}")]
    RaggedChannels {
        id:       String,
        channel:  usize,
        expected: usize,
        found:    usize,
    },

    #[error("recording '{id}' has {found} beat boundaries, at least 2 are required")]
    TooFewBeats { id: String, found: usize },

    #[error("recording '{id}': beat boundary {index} ({value}) is out of order or outside [0, {len})")]
    BadBoundary {
        id:    String,
        index: usize,
        value: usize,
        len:   usize,
    },

    #[error("recording '{id}': {found} event rows for {expected} beats")]
    EventRows {
        id:       String,
        expected: usize,
        found:    usize,
    },

    #[error("recording '{id}': event row {row} has {found} columns, vocabulary has {expected}")]
    EventColumns {
        id:       String,
        row:      usize,
        expected: usize,
        found:    usize,
    },
}

/// A validated multi-channel recording with beat annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecording", into = "RawRecording")]
pub struct Recording {
    id:            String,
    channels:      Vec<Vec<f32>>,
    beats:         Vec<usize>,
    events:        Option<Vec<Vec<f32>>>,
    disease_names: Vec<String>,
}

/// Unvalidated on-disk shape. Deserialisation goes through
/// `Recording::new` so a corrupt file never yields a Recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRecording {
    #[serde(default)]
    id:            String,
    channels:      Vec<Vec<f32>>,
    beats:         Vec<usize>,
    #[serde(default)]
    events:        Option<Vec<Vec<f32>>>,
    #[serde(default)]
    disease_names: Vec<String>,
}

impl TryFrom<RawRecording> for Recording {
    type Error = RecordingError;

    fn try_from(raw: RawRecording) -> Result<Self, Self::Error> {
        Recording::new(raw.id, raw.channels, raw.beats, raw.events, raw.disease_names)
    }
}

impl From<Recording> for RawRecording {
    fn from(r: Recording) -> Self {
        Self {
            id:            r.id,
            channels:      r.channels,
            beats:         r.beats,
            events:        r.events,
            disease_names: r.disease_names,
        }
    }
}

impl Recording {
    /// Build a recording, checking every invariant.
    pub fn new(
        id:            impl Into<String>,
        channels:      Vec<Vec<f32>>,
        beats:         Vec<usize>,
        events:        Option<Vec<Vec<f32>>>,
        disease_names: Vec<String>,
    ) -> Result<Self, RecordingError> {
        let id = id.into();

        let Some(first) = channels.first() else {
            return Err(RecordingError::NoChannels(id));
        };
        let len = first.len();
        for (channel, samples) in channels.iter().enumerate() {
            if samples.len() != len {
                return Err(RecordingError::RaggedChannels {
                    id,
                    channel,
                    expected: len,
                    found: samples.len(),
                });
            }
        }

        if beats.len() < 2 {
            return Err(RecordingError::TooFewBeats { id, found: beats.len() });
        }
        for (index, &value) in beats.iter().enumerate() {
            let ordered = index == 0 || beats[index - 1] < value;
            if !ordered || value >= len {
                return Err(RecordingError::BadBoundary { id, index, value, len });
            }
        }

        if let Some(rows) = &events {
            if rows.len() != beats.len() {
                return Err(RecordingError::EventRows {
                    id,
                    expected: beats.len(),
                    found:    rows.len(),
                });
            }
            // An empty vocabulary means "unnamed columns"; width is then
            // only checked downstream by the batch assembler.
            if !disease_names.is_empty() {
                if let Some((row, r)) = rows
                    .iter()
                    .enumerate()
                    .find(|(_, r)| r.len() != disease_names.len())
                {
                    return Err(RecordingError::EventColumns {
                        id,
                        row,
                        expected: disease_names.len(),
                        found:    r.len(),
                    });
                }
            }
        }

        Ok(Self { id, channels, beats, events, disease_names })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Same recording under another identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn beats(&self) -> &[usize] {
        &self.beats
    }

    /// Number of beat boundaries.
    pub fn num_beats(&self) -> usize {
        self.beats.len()
    }

    pub fn events(&self) -> Option<&[Vec<f32>]> {
        self.events.as_deref()
    }

    pub fn disease_names(&self) -> &[String] {
        &self.disease_names
    }

    /// First difference of every channel, with a leading zero so the
    /// coded signal keeps the original length.
    ///
    /// `[5, 5, 7, 7, 7]` → `[0, 0, 2, 0, 0]`
    pub fn delta_coded(&self) -> Vec<Vec<f32>> {
        self.channels.iter().map(|c| delta_code(c)).collect()
    }

    /// Crop to the samples `[start, start + len)`.
    ///
    /// Beats inside the crop are kept and re-indexed to the crop start,
    /// event rows follow the same selection. Fails if fewer than two
    /// beats survive.
    pub fn crop(&self, start: usize, len: usize) -> Result<Recording, RecordingError> {
        let end = (start + len).min(self.len());
        let start = start.min(end);

        let channels = self
            .channels
            .iter()
            .map(|c| c[start..end].to_vec())
            .collect();

        let kept: Vec<usize> = (0..self.beats.len())
            .filter(|&b| self.beats[b] >= start && self.beats[b] < end)
            .collect();
        let beats  = kept.iter().map(|&b| self.beats[b] - start).collect();
        let events = self
            .events
            .as_ref()
            .map(|rows| kept.iter().map(|&b| rows[b].clone()).collect());

        Recording::new(
            self.id.clone(),
            channels,
            beats,
            events,
            self.disease_names.clone(),
        )
    }
}

/// First difference with a leading zero.
pub fn delta_code(signal: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(signal.len());
    if signal.is_empty() {
        return out;
    }
    out.push(0.0);
    out.extend(signal.windows(2).map(|w| w[1] - w[0]));
    out
}
