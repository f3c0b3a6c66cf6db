// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs — Saving and loading model weights
//                   Uses Burn's CompactRecorder to serialise
//                   model parameters, tracks the latest step,
//                   and saves/loads TrainConfig as JSON so
//                   prediction can rebuild the model.
//
//   metrics.rs    — Training metrics logging
//                   Appends per-step loss terms to a CSV file
//                   for later analysis and plotting.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
