// ============================================================
// Layer 3 — Window Domain Type
// ============================================================
// A window is a contiguous run of (n_frames + overlap) beats
// taken from one recording. Window k starts at beat k*n_frames;
// the trailing `overlap` beats are shared with window k+1.
//
//   beats:     0 1 2 3 4 5 6 7 8 9 10 11 12 ...
//   window 0: [0 . . . . . . 7]                   n_frames=5, overlap=3
//   window 1:           [5 . . . . . . 12]

use std::sync::Arc;

use crate::domain::batch::Frames;

/// One window of consecutive beats, padded per beat to the
/// reduction ratio and per window to its longest beat.
#[derive(Debug, Clone)]
pub struct Window {
    /// Index of the first beat of the window in its recording
    pub start_beat: usize,

    /// `[n_frames + overlap, max_len, n_channels]` when raw data was requested
    pub raw: Option<Frames>,

    /// Delta-coded counterpart of `raw`
    pub delta: Option<Frames>,

    /// Event rows of the window's beats
    pub events: Option<Vec<Vec<f32>>>,

    /// Padded length of each beat (multiple of the reduction ratio)
    pub sequence_length: Vec<usize>,

    /// Unpadded length of each beat
    pub true_length: Vec<usize>,

    /// Column names of `events`, shared by every window of a recording
    pub disease_names: Arc<[String]>,
}

impl Window {
    pub fn n_beats(&self) -> usize {
        self.sequence_length.len()
    }

    /// Longest padded beat of the window
    pub fn max_len(&self) -> usize {
        self.sequence_length.iter().copied().max().unwrap_or(0)
    }

    /// Channel count of whichever signal tensor is present
    pub fn n_channels(&self) -> Option<usize> {
        self.raw
            .as_ref()
            .or(self.delta.as_ref())
            .map(Frames::n_channels)
    }
}
