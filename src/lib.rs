//! Varanus — host-based threat detection engine.
//!
//! Modular structure:
//! - [`collectors`] — Process, file, and audit log entity collection
//! - [`features`] — Fixed-width feature vector encoding per domain
//! - [`model`] — Feature standardization and ONNX classifier scoring
//! - [`registry`] — Known-malware SHA-256 digest list
//! - [`policy`] — Threshold decisions and the safe-extension whitelist
//! - [`engine`] — Scan orchestration across collect, score, decide
//! - [`server`] — HTTP scan endpoints
//! - [`logging`] — Structured logging

pub mod collectors;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod policy;
pub mod registry;
pub mod report;
pub mod server;

pub use config::EngineConfig;
pub use engine::{ScanEngine, ScanMode, ScanOutcome};
pub use error::{ArtifactError, ConfigError, Diagnostic, DiagnosticKind, ScanError, ScoreError};
pub use features::{FeatureVector, FEATURE_DIM};
pub use logging::StructuredLogger;
pub use model::{Classifier, FeatureScaler, Scorer};
pub use policy::{DecisionPolicy, Verdict};
pub use registry::HashRegistry;
pub use report::{EntityMetadata, ScanDomain, ThreatRecord};
