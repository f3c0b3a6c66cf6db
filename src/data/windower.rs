// ============================================================
// Layer 4 — Segment Windower
// ============================================================
// Cuts one recording into windows of consecutive beats.
//
//   n_windows = (num_beats - overlap) / n_frames - 1   (floor, min 0)
//   window k  = beats [k*n_frames, k*n_frames + n_frames + overlap)
//
// Every beat is padded twice:
//   1. up to the next multiple of `reduction_ratio`
//      (the conv stack halves the length log2(rr) times and
//       the frame RNN reads exactly length/rr steps)
//   2. up to the longest padded beat of its window
//
// Example, rr = 4:
//   beat lengths   7  5  8
//   padded         8  8  8   → window tensor [3, 8, C]
//
// The windower owns its recording and is consumed as it runs:
// once `next()` returns None it never yields again. Build a new
// one to iterate the same recording a second time.
//
// Reference: Rust Book §13 (Iterators)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::error::PipelineError;
use crate::domain::batch::Frames;
use crate::domain::recording::Recording;
use crate::domain::window::Window;

// ─── WindowConfig ─────────────────────────────────────────────────────────────
/// Shape of the windows and which tensors to materialise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Beats per window, excluding the overlap
    pub n_frames:        usize,
    /// Extra lookback beats carried by each window
    pub overlap:         usize,
    /// Factor every padded beat length must divide by
    pub reduction_ratio: usize,
    pub want_raw:        bool,
    pub want_delta:      bool,
    pub want_events:     bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            n_frames:        10,
            overlap:         5,
            reduction_ratio: 8,
            want_raw:        true,
            want_delta:      false,
            want_events:     false,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.n_frames == 0 {
            return Err(PipelineError::InvalidConfig("n_frames must be > 0".into()));
        }
        if self.reduction_ratio == 0 {
            return Err(PipelineError::InvalidConfig("reduction_ratio must be > 0".into()));
        }
        Ok(())
    }

    /// Rows each window contributes to a batch
    pub fn beats_per_window(&self) -> usize {
        self.n_frames + self.overlap
    }

    /// Number of windows a recording with `num_beats` boundaries yields.
    pub fn windows_for(&self, num_beats: usize) -> usize {
        let numerator = num_beats as i64 - self.overlap as i64;
        let n = numerator.div_euclid(self.n_frames as i64) - 1;
        n.max(0) as usize
    }
}

/// Round `len` up to the next multiple of `rr`.
pub fn pad_to_multiple(len: usize, rr: usize) -> usize {
    if len % rr == 0 {
        len
    } else {
        (len / rr + 1) * rr
    }
}

// ─── SegmentWindower ──────────────────────────────────────────────────────────
pub struct SegmentWindower {
    recording:     Recording,
    delta:         Option<Vec<Vec<f32>>>,
    disease_names: Arc<[String]>,
    config:        WindowConfig,
    next_window:   usize,
    n_windows:     usize,
}

impl SegmentWindower {
    /// Prepare the windows of `recording`. Delta coding, if requested,
    /// is computed here once for the whole recording.
    pub fn new(recording: Recording, config: &WindowConfig) -> Self {
        let n_windows     = config.windows_for(recording.num_beats());
        let delta         = config.want_delta.then(|| recording.delta_coded());
        let disease_names = Arc::from(recording.disease_names().to_vec());

        tracing::debug!(
            "Windowing '{}': {} beats → {} windows",
            recording.id(),
            recording.num_beats(),
            n_windows
        );

        Self {
            recording,
            delta,
            disease_names,
            config: config.clone(),
            next_window: 0,
            n_windows,
        }
    }

    /// Windows not yet produced
    pub fn remaining(&self) -> usize {
        self.n_windows - self.next_window
    }

    pub fn recording_id(&self) -> &str {
        self.recording.id()
    }

    /// Per-beat (padded, true) lengths of the beats [start, end)
    fn lengths(&self, start: usize, end: usize) -> (Vec<usize>, Vec<usize>) {
        let beats = self.recording.beats();
        (start..end)
            .map(|b| {
                let len = beats[b + 1] - beats[b];
                (pad_to_multiple(len, self.config.reduction_ratio), len)
            })
            .unzip()
    }

    /// Slice beats [start, end) out of `channels` into a padded frame tensor.
    fn format(&self, channels: &[Vec<f32>], start: usize, end: usize, max_len: usize) -> Frames {
        let beats = self.recording.beats();
        let mut frames = Frames::zeros(end - start, max_len, channels.len());

        for (row, b) in (start..end).enumerate() {
            let (from, to) = (beats[b], beats[b + 1]);
            for (c, channel) in channels.iter().enumerate() {
                for (t, &v) in channel[from..to].iter().enumerate() {
                    frames.set(row, t, c, v);
                }
            }
        }
        frames
    }
}

impl Iterator for SegmentWindower {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next_window >= self.n_windows {
            return None;
        }
        let k = self.next_window;
        self.next_window += 1;

        let start = k * self.config.n_frames;
        let end   = start + self.config.beats_per_window();

        let (sequence_length, true_length) = self.lengths(start, end);
        let max_len = sequence_length.iter().copied().max().unwrap_or(0);

        let raw = self
            .config
            .want_raw
            .then(|| self.format(self.recording.channels(), start, end, max_len));
        let delta = self
            .delta
            .as_ref()
            .map(|coded| self.format(coded, start, end, max_len));
        let events = if self.config.want_events {
            self.recording.events().map(|rows| rows[start..end].to_vec())
        } else {
            None
        };

        Some(Window {
            start_beat: start,
            raw,
            delta,
            events,
            sequence_length,
            true_length,
            disease_names: Arc::clone(&self.disease_names),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Recording with `n_beats` boundaries, beat b has length 3 + (b % 4)
    fn synthetic(n_beats: usize, with_events: bool) -> Recording {
        let mut beats = Vec::with_capacity(n_beats);
        let mut pos = 0;
        for b in 0..n_beats {
            beats.push(pos);
            pos += 3 + (b % 4);
        }
        let len = pos + 1;
        let ch0: Vec<f32> = (0..len).map(|x| x as f32).collect();
        let ch1: Vec<f32> = (0..len).map(|x| -(x as f32)).collect();
        let events = with_events.then(|| (0..n_beats).map(|b| vec![b as f32]).collect());
        Recording::new("syn", vec![ch0, ch1], beats, events, vec!["idx".into()]).unwrap()
    }

    fn config(n_frames: usize, overlap: usize, rr: usize) -> WindowConfig {
        WindowConfig {
            n_frames,
            overlap,
            reduction_ratio: rr,
            want_raw: true,
            want_delta: true,
            want_events: true,
        }
    }

    #[test]
    fn test_window_count_and_coverage() {
        // (25 - 3) // 5 - 1 = 3
        let windows: Vec<Window> = SegmentWindower::new(synthetic(25, true), &config(5, 3, 4)).collect();
        assert_eq!(windows.len(), 3);

        assert_eq!(windows[0].start_beat, 0);
        assert_eq!(windows[0].n_beats(), 8);
        let ev0: Vec<f32> = windows[0].events.as_ref().unwrap().iter().map(|r| r[0]).collect();
        assert_eq!(ev0, (0..8).map(|b| b as f32).collect::<Vec<_>>());

        assert_eq!(windows[2].start_beat, 10);
        let ev2: Vec<f32> = windows[2].events.as_ref().unwrap().iter().map(|r| r[0]).collect();
        assert_eq!(ev2, (10..18).map(|b| b as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_window_count_formula() {
        for n_beats in 2..60 {
            for (n_frames, overlap) in [(1, 0), (5, 3), (4, 10), (7, 2)] {
                let cfg = config(n_frames, overlap, 2);
                let expected = ((n_beats as i64 - overlap as i64).div_euclid(n_frames as i64) - 1).max(0);
                let produced = SegmentWindower::new(synthetic(n_beats, false), &cfg).count();
                assert_eq!(produced as i64, expected, "beats={n_beats} nf={n_frames} ov={overlap}");
            }
        }
    }

    #[test]
    fn test_too_few_beats_is_empty() {
        let mut w = SegmentWindower::new(synthetic(5, false), &config(5, 3, 4));
        assert_eq!(w.remaining(), 0);
        assert!(w.next().is_none());
    }

    #[test]
    fn test_padded_lengths_are_aligned() {
        for rr in [1, 2, 4, 8] {
            for w in SegmentWindower::new(synthetic(40, false), &config(5, 2, rr)) {
                for (&padded, &true_len) in w.sequence_length.iter().zip(&w.true_length) {
                    assert_eq!(padded % rr, 0);
                    assert!(padded >= true_len);
                    assert!(padded < true_len + rr);
                }
                let raw = w.raw.as_ref().unwrap();
                assert_eq!(raw.shape(), [7, w.max_len(), 2]);
            }
        }
    }

    #[test]
    fn test_beat_samples_and_zero_padding() {
        let rec = synthetic(20, false);
        let beats = rec.beats().to_vec();
        let w = SegmentWindower::new(rec, &config(3, 1, 4)).next().unwrap();
        let raw = w.raw.unwrap();

        // beat 1 starts at sample beats[1], length 4 → padded 4, window max 8
        let len = beats[2] - beats[1];
        for t in 0..len {
            assert_eq!(raw.get(1, t, 0), (beats[1] + t) as f32);
            assert_eq!(raw.get(1, t, 1), -((beats[1] + t) as f32));
        }
        for t in len..raw.max_len() {
            assert_eq!(raw.get(1, t, 0), 0.0);
        }
    }

    #[test]
    fn test_delta_is_sliced_like_raw() {
        let rec = synthetic(20, false);
        let w = SegmentWindower::new(rec, &config(3, 1, 2)).nth(1).unwrap();
        let delta = w.delta.unwrap();
        // ch0 is a ramp, so every delta sample inside a beat is 1
        for row in 0..w.true_length.len() {
            for t in 0..w.true_length[row] {
                assert_eq!(delta.get(row, t, 0), 1.0);
                assert_eq!(delta.get(row, t, 1), -1.0);
            }
        }
    }

    #[test]
    fn test_flags_control_tensors() {
        let cfg = WindowConfig {
            want_raw: false,
            want_delta: false,
            want_events: false,
            ..config(3, 1, 2)
        };
        let w = SegmentWindower::new(synthetic(20, true), &cfg).next().unwrap();
        assert!(w.raw.is_none() && w.delta.is_none() && w.events.is_none());
        assert_eq!(w.sequence_length.len(), 4);
    }

    #[test]
    fn test_exhausted_windower_stays_exhausted() {
        let mut w = SegmentWindower::new(synthetic(12, false), &config(3, 0, 1));
        assert_eq!(w.by_ref().count(), 3);
        assert!(w.next().is_none());
        assert!(w.next().is_none());
    }

    #[test]
    fn test_validate() {
        assert!(config(0, 1, 1).validate().is_err());
        assert!(config(1, 1, 0).validate().is_err());
        assert!(config(1, 0, 1).validate().is_ok());
    }
}
