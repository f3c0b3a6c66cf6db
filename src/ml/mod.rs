// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly — only this one.
//
// What's in this layer:
//
//   model.rs   — The recurrent beat autoencoder
//                • strided Conv1d compression of each beat
//                • frame GRU → one vector per beat
//                • window GRU → latent code Z
//                • decoder / decompress GRUs fed shifted inputs
//                • ConvTranspose1d expansion back to samples
//
//   tensors.rs — Conversion between plain Frames/Batch
//                values and Burn tensors
//
//   trainer.rs — Step-based training loop with Adam,
//                resume from the latest checkpoint, and the
//                runner implementing SignalAutoencoder
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Cho et al. (2014) GRU

/// Recurrent ECG beat autoencoder architecture
pub mod model;

/// Batch ↔ tensor conversion
pub mod tensors;

/// Training loop and checkpoint-backed model runner
pub mod trainer;
