//! Error taxonomy: fatal startup, caller-visible scan failure, scoring failure,
//! and diagnostics for degraded-but-successful scans.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Startup-time artifact problems. The process refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("classifier artifact missing: {}", path.display())]
    MissingClassifier { path: PathBuf },
    #[error("scaler artifact missing: {}", path.display())]
    MissingScaler { path: PathBuf },
    #[error("failed to load classifier: {0}")]
    ClassifierLoad(#[from] ort::Error),
    #[error("classifier graph unusable: {0}")]
    ClassifierShape(String),
    #[error("failed to parse scaler: {0}")]
    ScalerFormat(#[from] serde_json::Error),
    #[error("invalid scaler parameters: {0}")]
    ScalerInvalid(String),
    #[error("artifact unreadable: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold {0} outside (0, 1]")]
    ThresholdOutOfRange(f32),
    #[error("invalid bind address {addr}: {reason}")]
    BindAddr { addr: String, reason: String },
}

/// The one scan failure surfaced to callers. Everything else degrades to an
/// empty or partial result plus a [`Diagnostic`].
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan target not found: {}", path.display())]
    TargetNotFound { path: PathBuf },
}

/// Failures inside the scaler/classifier step. The orchestrator converts these
/// into a `ScoringFailure` diagnostic; they never abort a scan.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("feature batch rejected ({rows} rows): {reason}")]
    BadBatch { rows: usize, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    SourceUnavailable,
    PermissionDenied,
    ScoringFailure,
}

/// Non-fatal note attached to a degraded scan result and logged as a warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn source_unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::SourceUnavailable,
            detail: detail.into(),
        }
    }

    pub fn permission_denied(detail: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::PermissionDenied,
            detail: detail.into(),
        }
    }

    pub fn scoring_failure(detail: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::ScoringFailure,
            detail: detail.into(),
        }
    }
}
