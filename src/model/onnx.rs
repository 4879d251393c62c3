//! ONNX Runtime anomaly model. Input: [1, feature_dim] f32, output: a single
//! anomaly score.

use super::AnomalyModel;
use crate::error::TriageError;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;

pub struct OnnxModel {
    // ort sessions take &mut self to run; scoring serializes on this mutex
    // while rotation stays lock-free at the handle level.
    session: Mutex<Session>,
    output_name: String,
    feature_dim: usize,
    version: String,
}

impl OnnxModel {
    pub fn load(
        path: &Path,
        feature_dim: usize,
        version: impl Into<String>,
    ) -> Result<Self, TriageError> {
        let session = Session::builder()
            .map_err(|e| TriageError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| TriageError::ModelLoad(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| TriageError::ModelLoad(e.to_string()))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| TriageError::ModelLoad("model declares no output".into()))?;

        tracing::info!(path = %path.display(), feature_dim, "ONNX anomaly model loaded");

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            feature_dim,
            version: version.into(),
        })
    }
}

impl AnomalyModel for OnnxModel {
    fn score(&self, features: &[f32]) -> Result<f32, TriageError> {
        let dim = self.feature_dim.min(features.len());
        let arr = Array2::<f32>::from_shape_vec((1, dim), features[..dim].to_vec())
            .map_err(|e| TriageError::ModelLoad(e.to_string()))?;
        let input =
            Value::from_array(arr).map_err(|e| TriageError::ModelLoad(e.to_string()))?;

        let mut session = self.session.lock().expect("onnx session lock");
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| TriageError::ModelLoad(e.to_string()))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| TriageError::ModelLoad("model produced no output".into()))?;
        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| TriageError::ModelLoad(e.to_string()))?;

        let score = tensor.1.first().copied().unwrap_or(0.0);
        Ok(score.clamp(0.0, 1.0))
    }

    fn version(&self) -> &str {
        &self.version
    }
}
