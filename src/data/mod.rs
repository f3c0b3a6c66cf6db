// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer turns a corpus of beat-annotated ECG recordings
// into padded, model-ready mini-batches.
//
// The pipeline flows in this order:
//
//   *.json recordings
//       │
//       ▼
//   JsonRecordingStore → lists and loads recordings
//       │
//       ▼
//   CorpusPool         → shuffled ids of the current epoch
//       │
//       ▼
//   SegmentWindower    → one recording → windows of beats
//       │
//       ▼
//   RoundRobinBatcher  → one window per lane, re-seeds lanes
//       │
//       ▼
//   BatchAssembler     → zero-padded Batch, label selection
//       │
//       ▼
//   Prefetcher         → optional background producer
//
// ChunkSplitter / ChunkJoiner sit beside the pipeline: they cut
// very long recordings for inference and stitch the per-beat
// results back together.
//
// Reference: Rust Book §13 (Iterators and Closures)

pub mod error;

/// Loads .json recordings from a directory tree
pub mod loader;

/// Cuts one recording into windows of consecutive beats
pub mod windower;

/// Shuffled per-epoch list of recording ids
pub mod pool;

/// Stacks lane windows into one padded batch
pub mod assembler;

/// Round-robin multi-lane batch producer
pub mod batcher;

/// Splits long recordings into overlapping chunks and joins results
pub mod chunker;

/// Background thread feeding batches through a bounded channel
pub mod prefetch;

#[cfg(test)]
pub mod testing;
