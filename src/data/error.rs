// ============================================================
// Layer 4 — Pipeline Errors
// ============================================================
// Fatal conditions of the batching pipeline. Running out of
// windows is NOT listed here: a windower simply returns None
// and the batcher re-seeds the lane.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corpus is empty: no recordings found")]
    EmptyCorpus,

    #[error(
        "lane {lane}: could not source a usable recording after {attempts} attempts; \
         corpus likely too sparse or filtered too aggressively"
    )]
    CorpusStarvation { lane: usize, attempts: usize },

    #[error(
        "label vocabulary mismatch: expected {expected} required diseases, found {found} \
         (missing: {missing:?})"
    )]
    LabelVocabularyMismatch {
        expected: usize,
        found:    usize,
        missing:  Vec<String>,
    },

    #[error("lane {lane} window carries no event rows but events were requested")]
    MissingEvents { lane: usize },

    #[error("lane {lane} has {found} channels, expected {expected}")]
    ChannelMismatch {
        lane:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("lane {lane} window has {found} beats, expected {expected}")]
    WindowShape {
        lane:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("invalid chunking: {0}")]
    InvalidChunking(String),

    #[error("chunk {chunk} has {expected} beats but {found} results")]
    ChunkResultMismatch {
        chunk:    usize,
        expected: usize,
        found:    usize,
    },

    #[error("chunk reassembly produced {found} beats, original has {expected}")]
    ChunkJoinMismatch { expected: usize, found: usize },

    #[error("recording source failed: {0}")]
    Source(#[from] anyhow::Error),
}
