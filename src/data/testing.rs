// Test fixtures shared by the data-layer unit tests.

use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::recording::Recording;
use crate::domain::traits::RecordingSource;

/// Recording with `n_beats` boundaries spaced `spacing` samples apart.
///
/// Channel 0 is a ramp, channel 1 a constant `tag`. Events carry
/// `[beat index, tag]` under the vocabulary `["beat", "tag"]`.
pub fn beat_recording(id: &str, n_beats: usize, spacing: usize, tag: f32) -> Recording {
    let len   = n_beats * spacing + 1;
    let beats = (0..n_beats).map(|b| b * spacing).collect();
    let ramp  = (0..len).map(|x| x as f32).collect();
    let flat  = vec![tag; len];
    let events = (0..n_beats).map(|b| vec![b as f32, tag]).collect();
    Recording::new(
        id,
        vec![ramp, flat],
        beats,
        Some(events),
        vec!["beat".to_string(), "tag".to_string()],
    )
    .expect("fixture recording is valid")
}

/// In-memory corpus that counts loads and can be told to fail some ids.
#[derive(Default)]
pub struct MemorySource {
    pub files:   BTreeMap<String, Vec<Recording>>,
    pub failing: HashSet<String>,
    pub loads:   Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new(recordings: Vec<Recording>) -> Self {
        let files = recordings
            .into_iter()
            .map(|r| (r.id().to_string(), vec![r]))
            .collect();
        Self { files, ..Default::default() }
    }

    pub fn with_bundle(mut self, id: &str, parts: Vec<Recording>) -> Self {
        self.files.insert(id.to_string(), parts);
        self
    }

    pub fn with_failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self.files.entry(id.to_string()).or_default();
        self
    }

    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl RecordingSource for MemorySource {
    fn list_recordings(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn load_recording(&self, id: &str) -> Result<Recording> {
        self.load_bundle(id)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("'{id}' is empty"))
    }

    fn load_bundle(&self, id: &str) -> Result<Vec<Recording>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(id) {
            return Err(anyhow!("'{id}' is corrupt"));
        }
        self.files
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("'{id}' not found"))
    }
}
