//! ONNX classifier session. Input: [N, 8] f32 standardized features. Output:
//! per-class probabilities; the malicious class is the final column of the
//! final output tensor (the graph is exported with probabilities as a plain
//! tensor, not a class map).

use super::Classifier;
use crate::error::{ArtifactError, ScoreError};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;

pub struct OnnxClassifier {
    // ort inference takes &mut; the lock keeps `predict_proba` shareable
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxClassifier {
    /// Load the graph once at startup. A missing or unreadable artifact is
    /// fatal; there is no degraded no-model mode.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::MissingClassifier {
                path: path.to_path_buf(),
            });
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)?;

        let output_name = session
            .outputs
            .last()
            .map(|o| o.name.clone())
            .ok_or_else(|| ArtifactError::ClassifierShape("graph declares no outputs".into()))?;

        tracing::info!(path = %path.display(), output = %output_name, "classifier loaded");
        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, batch: Array2<f32>) -> Result<Vec<f32>, ScoreError> {
        let rows = batch.nrows();
        if rows == 0 {
            return Ok(Vec::new());
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| ScoreError::Inference("classifier session lock poisoned".into()))?;

        let tensor =
            Value::from_array(batch).map_err(|e| ScoreError::Inference(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ScoreError::Inference(e.to_string()))?;
        let output = outputs.get(&self.output_name).ok_or_else(|| {
            ScoreError::Inference(format!("output {} missing from results", self.output_name))
        })?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ScoreError::Inference(e.to_string()))?;
        malicious_column(data, rows)
    }
}

/// Pick the final class column out of a flat `[rows * classes]` probability
/// tensor. `rows` must be nonzero; the caller short-circuits empty batches.
fn malicious_column(data: &[f32], rows: usize) -> Result<Vec<f32>, ScoreError> {
    if data.len() % rows != 0 {
        return Err(ScoreError::Inference(format!(
            "probability tensor of {} values does not divide into {} rows",
            data.len(),
            rows
        )));
    }
    let classes = data.len() / rows;
    if classes == 0 {
        return Err(ScoreError::Inference(
            "probability tensor came back empty".into(),
        ));
    }
    Ok((0..rows)
        .map(|r| data[r * classes + (classes - 1)])
        .collect())
}
