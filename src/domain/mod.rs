// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the system
// works with:
//
//   - CaptionRecord / CaptionPolicy  (what a training image is)
//   - CaptionError                   (what can go wrong)
//   - Tokenize / FeatureExtractor    (the external collaborators)
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// An image identifier with its caption variants
pub mod caption_record;

/// The core error taxonomy
pub mod error;

/// Tokenizer and backbone abstractions
pub mod traits;
