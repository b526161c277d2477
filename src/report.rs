//! Serializable scan output: per-domain metadata records and the ThreatRecord
//! each scanned entity becomes.

use crate::policy::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDomain {
    Process,
    File,
    Log,
}

/// How an entity was detected: exact digest match, or the classifier path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Hash,
    Ml,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetadata {
    pub pid: u32,
    pub process_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_path: String,
    /// SHA-256 of the content; absent when the file could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub detection: DetectionMethod,
    /// Path the caller knew the content by, for uploaded-file scans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    /// Result of the document keyword scan (`.pdf`/`.docx` only). Recorded but
    /// not an input to the feature vector or the verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_flag: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Event id masked to 16 bits
    pub event_id: u32,
    pub event_type: u16,
    pub source_name: String,
    pub time_generated: DateTime<Utc>,
    pub event_category: u16,
}

/// Identity fields for one scanned entity, tagged by domain. Flattens into the
/// serialized [`ThreatRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityMetadata {
    Process(ProcessMetadata),
    File(FileMetadata),
    Log(LogMetadata),
}

impl EntityMetadata {
    pub fn detection(&self) -> DetectionMethod {
        match self {
            EntityMetadata::File(f) => f.detection,
            _ => DetectionMethod::Ml,
        }
    }
}

/// One entity's verdict. Hash-detected records carry score 1.0 and an empty
/// feature vector; every other record carries the vector the score came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub threat_score: f32,
    pub scan_type: ScanDomain,
    pub timestamp: DateTime<Utc>,
    pub feature_vector: Vec<f32>,
    pub conclusion: Verdict,
    #[serde(flatten)]
    pub metadata: EntityMetadata,
}

impl ThreatRecord {
    /// Rewrite the file metadata to the path the caller knew the content by.
    /// No-op for process and log records.
    pub fn set_original_path(&mut self, original: &str) {
        if let EntityMetadata::File(f) = &mut self.metadata {
            f.original_path = Some(original.to_string());
        }
    }
}
