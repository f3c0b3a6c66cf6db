// ============================================================
// Layer 4 — Recording Chunker
// ============================================================
// Splits a long recording into `n_chunks` overlapping pieces
// so each can be processed on its own, then stitches per-beat
// results back into one sequence for the whole recording.
//
//   |--------------len_of_chunk--------------|
//   |****************************|***********|
//   |                            |--overlap--|
//                                |****************************|***********|
//                                ^ begin of chunk 1
//
//   len_of_chunk = (total_len - overlap) / n_chunks + 1 + overlap
//   begin(c)     = c * (len_of_chunk - overlap)
//
// The signal tail is extended with a linear ramp from the last
// sample down to zero, so the last chunk is as long as the
// others. A beat belongs to every chunk whose [begin, end)
// contains it; beats in the first `overlap` samples of chunk
// c ≥ 1 were already produced by chunk c-1 and are dropped on
// join.
//
// Reference: Rust Book §8 (Slices)

use crate::data::error::PipelineError;
use crate::domain::recording::{Recording, RecordingError};

/// One piece of a chunked recording.
///
/// Beat boundaries are relative to `begin`. A chunk may hold
/// fewer than two boundaries, so it is not a `Recording` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index:         usize,
    /// First sample of the chunk in the padded parent signal
    pub begin:         usize,
    pub channels:      Vec<Vec<f32>>,
    pub beats:         Vec<usize>,
    pub events:        Option<Vec<Vec<f32>>>,
    pub disease_names: Vec<String>,
    parent_id:         String,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_beats(&self) -> usize {
        self.beats.len()
    }

    /// Validated recording of this chunk, named `<parent>#chunk<index>`.
    pub fn to_recording(&self) -> Result<Recording, RecordingError> {
        Recording::new(
            format!("{}#chunk{}", self.parent_id, self.index),
            self.channels.clone(),
            self.beats.clone(),
            self.events.clone(),
            self.disease_names.clone(),
        )
    }
}

/// Chunk geometry shared by splitting and joining.
#[derive(Debug, Clone, Copy)]
struct Layout {
    n_chunks:     usize,
    overlap:      usize,
    len_of_chunk: usize,
    padding:      usize,
}

impl Layout {
    fn new(n_chunks: usize, overlap: usize, total_len: usize) -> Result<Self, PipelineError> {
        if n_chunks == 0 {
            return Err(PipelineError::InvalidChunking("n_chunks must be > 0".into()));
        }
        if total_len <= overlap {
            return Err(PipelineError::InvalidChunking(format!(
                "recording of {total_len} samples is not longer than the overlap ({overlap})"
            )));
        }
        let len_of_chunk = (total_len - overlap) / n_chunks + 1 + overlap;
        let padding      = (len_of_chunk - overlap) * n_chunks + overlap - total_len;
        Ok(Self { n_chunks, overlap, len_of_chunk, padding })
    }

    fn begin(&self, c: usize) -> usize {
        c * (self.len_of_chunk - self.overlap)
    }

    /// Boundaries of `beats` falling in `[from, from + len)`
    fn count_in(beats: &[usize], from: usize, len: usize) -> usize {
        beats.iter().filter(|&&b| b >= from && b < from + len).count()
    }
}

// ─── ChunkSplitter ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct ChunkSplitter {
    n_chunks: usize,
    overlap:  usize,
}

impl ChunkSplitter {
    pub fn new(n_chunks: usize, overlap: usize) -> Self {
        Self { n_chunks, overlap }
    }

    /// The joiner that undoes this splitter.
    pub fn joiner(&self) -> ChunkJoiner {
        ChunkJoiner::new(self.n_chunks, self.overlap)
    }

    pub fn split(&self, recording: &Recording) -> Result<Vec<Chunk>, PipelineError> {
        let layout = Layout::new(self.n_chunks, self.overlap, recording.len())?;

        let padded: Vec<Vec<f32>> = recording
            .channels()
            .iter()
            .map(|channel| {
                let last = channel.last().copied().unwrap_or(0.0);
                let mut out = Vec::with_capacity(channel.len() + layout.padding);
                out.extend_from_slice(channel);
                out.extend(linspace(last, 0.0, layout.padding));
                out
            })
            .collect();

        tracing::debug!(
            "Splitting '{}' into {} chunks of {} samples ({} padding)",
            recording.id(),
            layout.n_chunks,
            layout.len_of_chunk,
            layout.padding
        );

        let chunks = (0..layout.n_chunks)
            .map(|c| {
                let begin = layout.begin(c);
                let end   = begin + layout.len_of_chunk;

                let kept: Vec<usize> = recording
                    .beats()
                    .iter()
                    .enumerate()
                    .filter(|(_, &b)| b >= begin && b < end)
                    .map(|(i, _)| i)
                    .collect();

                Chunk {
                    index:         c,
                    begin,
                    channels:      padded.iter().map(|ch| ch[begin..end].to_vec()).collect(),
                    beats:         kept.iter().map(|&i| recording.beats()[i] - begin).collect(),
                    events:        recording
                        .events()
                        .map(|rows| kept.iter().map(|&i| rows[i].clone()).collect()),
                    disease_names: recording.disease_names().to_vec(),
                    parent_id:     recording.id().to_string(),
                }
            })
            .collect();

        Ok(chunks)
    }
}

// ─── ChunkJoiner ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct ChunkJoiner {
    n_chunks: usize,
    overlap:  usize,
}

impl ChunkJoiner {
    pub fn new(n_chunks: usize, overlap: usize) -> Self {
        Self { n_chunks, overlap }
    }

    /// Concatenate per-beat results of every chunk, dropping the
    /// beats each chunk shares with its predecessor.
    ///
    /// `results[c]` must hold one entry per beat of chunk `c`.
    pub fn join<T>(&self, original: &Recording, results: Vec<Vec<T>>) -> Result<Vec<T>, PipelineError> {
        let layout = Layout::new(self.n_chunks, self.overlap, original.len())?;
        if results.len() != layout.n_chunks {
            return Err(PipelineError::InvalidChunking(format!(
                "{} chunk results for {} chunks",
                results.len(),
                layout.n_chunks
            )));
        }

        let beats = original.beats();
        let mut joined = Vec::with_capacity(original.num_beats());
        for (c, chunk) in results.into_iter().enumerate() {
            let begin    = layout.begin(c);
            let expected = Layout::count_in(beats, begin, layout.len_of_chunk);
            if chunk.len() != expected {
                return Err(PipelineError::ChunkResultMismatch {
                    chunk: c,
                    expected,
                    found: chunk.len(),
                });
            }

            let skip = if c == 0 { 0 } else { Layout::count_in(beats, begin, layout.overlap) };
            joined.extend(chunk.into_iter().skip(skip));
        }

        if joined.len() != original.num_beats() {
            return Err(PipelineError::ChunkJoinMismatch {
                expected: original.num_beats(),
                found:    joined.len(),
            });
        }
        Ok(joined)
    }
}

/// `n` evenly spaced values from `start` to `stop`, both included.
fn linspace(start: f32, stop: f32, n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f32;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f32 })
                .collect()
        }
    }
}
