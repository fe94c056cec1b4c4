// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw annotation lines to tensor batches.
//
//   annotation streams
//       │
//       ▼
//   corpus            → parse + join into CaptionRecords
//       │
//       ▼
//   tokenizer         → caption text → token strings
//       │
//       ▼
//   vocabulary        → built ONCE over the whole corpus
//       │
//       ▼
//   sequence          → fixed-length ids + mask per caption
//       │
//       ▼
//   splitter          → train / validation by image
//       │
//       ▼
//   dataset           → cached samples (Burn Dataset)
//       │
//       ▼
//   batcher           → tensor batches (Burn Batcher)
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Annotation line parsing and stream joining
pub mod corpus;

/// Whitespace and HuggingFace tokenizers
pub mod tokenizer;

/// Token <-> id mapping with reserved specials
pub mod vocabulary;

/// Caption → fixed-length ids + attention mask
pub mod sequence;

/// Image-level train/validation split
pub mod splitter;

/// Cached caption samples behind Burn's Dataset trait
pub mod dataset;

/// Teacher-forcing batches behind Burn's Batcher trait
pub mod batcher;
