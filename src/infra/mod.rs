// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-backed concerns shared by training and captioning:
//
//   checkpoint.rs     — model weights (CompactRecorder), run and
//                       architecture configs, latest-epoch pointer
//
//   vocab_store.rs    — vocab.json, so captioning decodes with
//                       the training-time id mapping
//
//   metrics.rs        — per-epoch CSV log (loss, token accuracy)
//
//   feature_store.rs  — precomputed backbone features served
//                       through the FeatureExtractor trait
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary persistence
pub mod vocab_store;

/// Training metrics CSV logger
pub mod metrics;

/// Offline-extracted image features keyed by image id
pub mod feature_store;
