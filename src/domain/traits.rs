// ============================================================
// Layer 3 — Core Traits (Collaborator Seams)
// ============================================================
// The captioning core talks to two external collaborators
// only through these traits:
//
//   Tokenize          → splits caption text into tokens
//                       (whitespace, HuggingFace tokenizer.json,
//                        or any plain closure)
//   FeatureExtractor  → the frozen image backbone, seen as a
//                       black box `input -> feature vector`
//
// Both are injected at construction time. Nothing in the core
// holds a backbone or tokenizer as global state.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::CaptionResult;

// ─── Tokenize ─────────────────────────────────────────────────────────────────
/// Turns a caption into an ordered sequence of token strings.
///
/// Implementations must be deterministic and side-effect free:
/// the vocabulary is built from their output once, and every
/// later encoding must see the same tokens.
pub trait Tokenize: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Fallible form used when building vocabularies and datasets.
    /// Implementations that can fail override this and must not
    /// hide the failure behind an empty token list.
    fn try_tokenize(&self, text: &str) -> CaptionResult<Vec<String>> {
        Ok(self.tokenize(text))
    }
}

/// Any pure function `&str -> Vec<String>` is a tokenizer.
impl<F> Tokenize for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn tokenize(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

// ─── FeatureExtractor ─────────────────────────────────────────────────────────
/// The frozen backbone.
///
/// `Input` is whatever the backbone consumes: a decoded image
/// tensor for a live network, or an image identifier for a store
/// of features extracted offline.
pub trait FeatureExtractor: Send + Sync {
    type Input: ?Sized;

    /// Width of every vector `extract` returns. Known up front so
    /// the projection layer can be sized at construction.
    fn feature_width(&self) -> usize;

    fn extract(&self, input: &Self::Input) -> CaptionResult<Vec<f32>>;
}
