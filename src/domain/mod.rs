// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the core concepts:
// recordings, windows of beats, padded batches, and the two
// collaborator traits (recording storage, autoencoder model).
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain data, validation, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A validated multi-channel ECG recording with beat boundaries
pub mod recording;

// A run of consecutive beats cut from one recording
pub mod window;

// Zero-padded frame tensors and assembled batches
pub mod batch;

// Core abstractions (traits) that other layers implement
pub mod traits;
