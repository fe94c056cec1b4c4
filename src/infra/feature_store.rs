// ============================================================
// Layer 6 — Precomputed Feature Store
// ============================================================
// The frozen CNN backbone runs outside this crate. Its outputs
// are stored once as a JSON object keyed by image identifier:
//
//   {
//     "1000268201_693b08cb0e": [0.12, 0.0, 1.7, ...],
//     "1001773457_577c3a7d70": [0.03, 0.4, 0.0, ...]
//   }
//
// PrecomputedFeatures serves those vectors through the
// FeatureExtractor trait, so the rest of the system cannot tell
// it apart from a live backbone.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::error::{CaptionError, CaptionResult};
use crate::domain::traits::FeatureExtractor;

#[derive(Debug, Clone)]
pub struct PrecomputedFeatures {
    width:    usize,
    features: HashMap<String, Vec<f32>>,
}

impl PrecomputedFeatures {
    /// Every vector must have the same, non-zero width.
    pub fn from_map(features: HashMap<String, Vec<f32>>) -> CaptionResult<Self> {
        let width = features
            .values()
            .next()
            .map(Vec::len)
            .ok_or_else(|| CaptionError::InvalidInput("feature store is empty".into()))?;
        if width == 0 {
            return Err(CaptionError::ShapeMismatch("feature vectors have zero width".into()));
        }
        if let Some((id, v)) = features.iter().find(|(_, v)| v.len() != width) {
            return Err(CaptionError::ShapeMismatch(format!(
                "feature vector for '{id}' has width {}, expected {width}",
                v.len()
            )));
        }
        Ok(Self { width, features })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read feature store '{}'", path.display()))?;
        let map: HashMap<String, Vec<f32>> = serde_json::from_str(&json)
            .with_context(|| format!("Feature store '{}' is not valid JSON", path.display()))?;
        let store = Self::from_map(map)?;
        tracing::info!(
            "Loaded {} feature vectors of width {} from '{}'",
            store.len(),
            store.width,
            path.display()
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, image_id: &str) -> bool {
        self.features.contains_key(image_id)
    }
}

impl FeatureExtractor for PrecomputedFeatures {
    type Input = str;

    fn feature_width(&self) -> usize {
        self.width
    }

    fn extract(&self, image_id: &str) -> CaptionResult<Vec<f32>> {
        self.features.get(image_id).cloned().ok_or_else(|| {
            CaptionError::InvalidInput(format!("no features stored for image '{image_id}'"))
        })
    }
}
