// ============================================================
// Layer 3 — Core Error Taxonomy
// ============================================================
// Every precondition violation the captioning core can detect
// is one of these four variants. They are raised at
// construction time or at the very start of a forward call,
// never in the middle of numeric work.
//
// The outer layers (application, CLI) use anyhow; a
// CaptionError converts into anyhow::Error through `?`.
//
// Unknown tokens are NOT errors: they resolve to <unk>.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptionError {
    /// Malformed caption record, bad annotation line, or a
    /// `max_seq_length` too small to hold <bos> and <eos>.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Embedding width not divisible by the head count, or
    /// tensor widths that do not line up between components.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Vocabulary id lookup outside the assigned range.
    #[error("token id {id} is out of range for a vocabulary of {len} tokens")]
    OutOfRange { id: usize, len: usize },

    /// Structurally impossible model configuration
    /// (zero decoder layers, zero heads, ...).
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

pub type CaptionResult<T> = std::result::Result<T, CaptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message_names_id_and_len() {
        let err = CaptionError::OutOfRange { id: 42, len: 8 };
        assert_eq!(
            err.to_string(),
            "token id 42 is out of range for a vocabulary of 8 tokens"
        );
    }

    #[test]
    fn test_converts_into_anyhow() {
        fn fails() -> anyhow::Result<()> {
            Err(CaptionError::ConfigurationError("zero layers".into()))?
        }
        let err = fails().unwrap_err();
        assert!(err.to_string().contains("zero layers"));
    }
}
