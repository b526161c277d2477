//! Fitted feature standardization. The JSON artifact carries the training-time
//! per-feature mean and scale (standard deviation); scoring applies
//! `(x - mean) / scale` before the classifier sees anything.

use crate::error::ArtifactError;
use crate::features::{FeatureVector, FEATURE_DIM};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl FeatureScaler {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self, ArtifactError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Missing or malformed parameters are a startup refusal, same as a
    /// missing classifier.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::MissingScaler {
                path: path.to_path_buf(),
            });
        }
        let data = std::fs::read_to_string(path)?;
        let scaler: Self = serde_json::from_str(&data)?;
        scaler.validate()?;
        tracing::info!(path = %path.display(), "feature scaler loaded");
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.mean.len() != FEATURE_DIM || self.scale.len() != FEATURE_DIM {
            return Err(ArtifactError::ScalerInvalid(format!(
                "expected {FEATURE_DIM} mean/scale entries, got {}/{}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(ArtifactError::ScalerInvalid(
                "non-finite parameter".to_string(),
            ));
        }
        if self.scale.iter().any(|s| s.abs() < 1e-12) {
            return Err(ArtifactError::ScalerInvalid(
                "scale entry is zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, vector: &FeatureVector) -> [f32; FEATURE_DIM] {
        let mut out = [0.0f32; FEATURE_DIM];
        for (i, (value, out_slot)) in vector.as_slice().iter().zip(&mut out).enumerate() {
            *out_slot = (value - self.mean[i]) / self.scale[i];
        }
        out
    }
}
