// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn module code lives here.
//
//   positional.rs — fixed sinusoidal position table
//   attention.rs  — multi-head attention + mask builders
//   decoder.rs    — post-norm decoder layer and layer stack
//   model.rs      — feature projection + decoder, teacher-forced loss
//   generator.rs  — greedy decoding and the Captioner
//   trainer.rs    — Adam training loop with validation
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

/// Sinusoidal positional encoding
pub mod positional;

/// Scaled dot-product multi-head attention
pub mod attention;

/// Decoder layer and stack
pub mod decoder;

/// Image-conditioned captioning model
pub mod model;

/// Greedy caption generation
pub mod generator;

/// Full training loop with validation and checkpointing
pub mod trainer;
