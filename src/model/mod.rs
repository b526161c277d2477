//! Scoring: the fitted scaler and trained classifier behind one batch call.
//! The scorer owns both artifacts, does no I/O after load, and never decides
//! verdicts.

mod onnx;
mod scaler;

pub use onnx::OnnxClassifier;
pub use scaler::FeatureScaler;

use crate::error::{ArtifactError, ScoreError};
use crate::features::{FeatureVector, FEATURE_DIM};
use ndarray::Array2;
use std::path::Path;

/// Malicious-class probability per row of a standardized [N, 8] batch.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, batch: Array2<f32>) -> Result<Vec<f32>, ScoreError>;
}

pub struct Scorer {
    scaler: FeatureScaler,
    classifier: Box<dyn Classifier>,
}

impl Scorer {
    /// Load both artifacts; either one missing or corrupt refuses startup.
    pub fn load(model_path: &Path, scaler_path: &Path) -> Result<Self, ArtifactError> {
        let scaler = FeatureScaler::load(scaler_path)?;
        let classifier = OnnxClassifier::load(model_path)?;
        Ok(Self::new(scaler, Box::new(classifier)))
    }

    pub fn new(scaler: FeatureScaler, classifier: Box<dyn Classifier>) -> Self {
        Self { scaler, classifier }
    }

    /// Standardize and classify one batch. A batch of one needs no
    /// special-casing by the caller; an empty batch is an empty result.
    pub fn score(&self, vectors: &[FeatureVector]) -> Result<Vec<f32>, ScoreError> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut data = Vec::with_capacity(vectors.len() * FEATURE_DIM);
        for vector in vectors {
            data.extend_from_slice(&self.scaler.transform(vector));
        }
        let batch = Array2::from_shape_vec((vectors.len(), FEATURE_DIM), data).map_err(|e| {
            ScoreError::BadBatch {
                rows: vectors.len(),
                reason: e.to_string(),
            }
        })?;

        let scores = self.classifier.predict_proba(batch)?;
        if scores.len() != vectors.len() {
            return Err(ScoreError::BadBatch {
                rows: vectors.len(),
                reason: format!("classifier returned {} scores", scores.len()),
            });
        }
        Ok(scores.into_iter().map(|s| s.clamp(0.0, 1.0)).collect())
    }
}
