#![recursion_limit = "256"]

// ============================================================
// image-captioner
// ============================================================
// Transformer decoder that turns a frozen backbone's image
// feature vector into a caption.
//
//   Layer 1  cli          — clap commands
//   Layer 2  application  — train / caption workflows
//   Layer 3  domain       — records, errors, collaborator traits
//   Layer 4  data         — corpus → vocabulary → batches
//   Layer 5  ml           — Burn modules, training, decoding
//   Layer 6  infra        — checkpoints, vocab, metrics, features

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
