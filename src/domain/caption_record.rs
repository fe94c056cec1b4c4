// ============================================================
// Layer 3 — CaptionRecord Domain Type
// ============================================================
// One image and every caption written for it.
//
// Records are produced once by the corpus reader, which joins
// the primary annotation stream with an alternate stream (for
// example lemmatised captions) on the image identifier.
// After that they are read-only.
//
// Example:
//   image_id: "1000268201_693b08cb0e"
//   captions: ["A child in a pink dress is climbing up ...",
//              "A girl going into a wooden building .", ...]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{CaptionError, CaptionResult};

/// An image identifier with its ordered caption variants.
///
/// Invariant: `captions` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRecord {
    image_id: String,
    captions: Vec<String>,
}

impl CaptionRecord {
    /// Build a record, rejecting an empty identifier or an
    /// empty caption list.
    pub fn new(image_id: impl Into<String>, captions: Vec<String>) -> CaptionResult<Self> {
        let image_id = image_id.into();
        if image_id.trim().is_empty() {
            return Err(CaptionError::InvalidInput(
                "caption record has an empty image identifier".into(),
            ));
        }
        if captions.is_empty() {
            return Err(CaptionError::InvalidInput(format!(
                "image '{image_id}' has no captions"
            )));
        }
        Ok(Self { image_id, captions })
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    /// The first caption variant, as listed in the primary stream.
    pub fn primary(&self) -> &str {
        &self.captions[0]
    }

    pub fn variant_count(&self) -> usize {
        self.captions.len()
    }
}

// ─── CaptionPolicy ────────────────────────────────────────────────────────────
/// Which caption variant(s) of a record become training samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptionPolicy {
    /// One sample per image: its first caption.
    #[default]
    FirstOnly,
    /// One sample per caption variant.
    AllVariants,
    /// One sample per image; the variant is re-drawn every epoch.
    RandomPerEpoch,
}

impl FromStr for CaptionPolicy {
    type Err = CaptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-only"       => Ok(Self::FirstOnly),
            "all-variants"     => Ok(Self::AllVariants),
            "random-per-epoch" => Ok(Self::RandomPerEpoch),
            other => Err(CaptionError::InvalidInput(format!(
                "unknown caption policy '{other}' \
                 (expected first-only, all-variants or random-per-epoch)"
            ))),
        }
    }
}

impl fmt::Display for CaptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FirstOnly      => "first-only",
            Self::AllVariants    => "all-variants",
            Self::RandomPerEpoch => "random-per-epoch",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_captions() {
        let err = CaptionRecord::new("img", Vec::new()).unwrap_err();
        assert!(matches!(err, CaptionError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_blank_identifier() {
        let err = CaptionRecord::new("  ", vec!["a dog".into()]).unwrap_err();
        assert!(matches!(err, CaptionError::InvalidInput(_)));
    }

    #[test]
    fn test_primary_is_first_variant() {
        let r = CaptionRecord::new("img", vec!["first".into(), "second".into()]).unwrap();
        assert_eq!(r.primary(), "first");
        assert_eq!(r.variant_count(), 2);
    }

    #[test]
    fn test_policy_parses_and_displays() {
        for p in [
            CaptionPolicy::FirstOnly,
            CaptionPolicy::AllVariants,
            CaptionPolicy::RandomPerEpoch,
        ] {
            assert_eq!(p.to_string().parse::<CaptionPolicy>().unwrap(), p);
        }
        assert!("every-other".parse::<CaptionPolicy>().is_err());
    }
}
