//! Anomaly scoring over feature vectors. The loaded model is process-wide,
//! explicitly installed at startup and swapped wholesale on rotation; scoring
//! never mutates it.

mod onnx;

pub use onnx::OnnxModel;

use crate::error::TriageError;
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Calibrated anomaly score in [0,1] plus the model version that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub value: f32,
    pub model_version: String,
}

/// A trained, immutable anomaly model. Implementations must be safe to call
/// from many tasks concurrently.
pub trait AnomalyModel: Send + Sync {
    fn score(&self, features: &[f32]) -> Result<f32, TriageError>;
    fn version(&self) -> &str;
}

/// Swappable handle to the currently loaded model. Readers clone the inner
/// Arc and score against it outside the lock, so a rotation in flight never
/// stalls concurrent scoring beyond the pointer swap itself.
pub struct ScorerHandle {
    model: RwLock<Option<Arc<dyn AnomalyModel>>>,
}

impl ScorerHandle {
    pub fn empty() -> Self {
        Self {
            model: RwLock::new(None),
        }
    }

    pub fn with_model(model: Arc<dyn AnomalyModel>) -> Self {
        Self {
            model: RwLock::new(Some(model)),
        }
    }

    /// Install or rotate the loaded model (copy-and-swap).
    pub fn install(&self, model: Arc<dyn AnomalyModel>) {
        *self.model.write().expect("scorer lock") = Some(model);
    }

    /// Explicit teardown; subsequent scoring fails with ModelUnavailable.
    pub fn unload(&self) {
        *self.model.write().expect("scorer lock") = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().expect("scorer lock").is_some()
    }

    pub fn score(&self, features: &FeatureVector) -> Result<AnomalyScore, TriageError> {
        let model = self
            .model
            .read()
            .expect("scorer lock")
            .clone()
            .ok_or(TriageError::ModelUnavailable)?;
        let value = model.score(features.as_slice())?.clamp(0.0, 1.0);
        Ok(AnomalyScore {
            value,
            model_version: model.version().to_string(),
        })
    }
}

/// Fixed-score model for dry runs when no ONNX file is available, and for
/// tests.
pub struct StaticModel {
    value: f32,
    version: String,
}

impl StaticModel {
    pub fn new(value: f32, version: impl Into<String>) -> Self {
        Self {
            value,
            version: version.into(),
        }
    }
}

impl AnomalyModel for StaticModel {
    fn score(&self, _features: &[f32]) -> Result<f32, TriageError> {
        Ok(self.value)
    }

    fn version(&self) -> &str {
        &self.version
    }
}
