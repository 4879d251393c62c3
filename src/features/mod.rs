//! Deterministic per-event feature extraction.

mod vectorizer;

pub use vectorizer::Vectorizer;

use serde::{Deserialize, Serialize};

/// Fixed-size feature vector for model input. Length is constant for a given
/// schema version; recomputing from the same event is byte-for-byte
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema_version: u32,
    pub values: Vec<f32>,
    pub event_id: String,
}

impl FeatureVector {
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}
