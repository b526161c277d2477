//! Turns a raw malicious-class probability into a verdict. Tiered: exact hash
//! evidence first, then the threshold, then the file-extension allowlist.

use crate::report::{DetectionMethod, EntityMetadata};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Benign,
    Malicious,
}

/// Extensions that never produce a malicious verdict through the classifier
/// path. A hash match has first refusal and is unaffected.
const SAFE_EXTENSIONS: [&str; 11] = [
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".ico", ".dll", ".sys", ".txt", ".md", ".pdf",
];

/// A name carries an extension only when a non-dot character precedes the
/// final dot; `.txt` and `..txt` are extensionless names, not text files.
pub fn safe_extension(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    let Some(dot) = lower.rfind('.') else {
        return false;
    };
    if lower[..dot].bytes().all(|b| b == b'.') {
        return false;
    }
    let ext = &lower[dot..];
    SAFE_EXTENSIONS.iter().any(|safe| ext == *safe)
}

pub struct DecisionPolicy {
    threshold: f32,
}

impl DecisionPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score exactly at the threshold is malicious. Only file entities carry
    /// the allowlist override; process and log verdicts come straight from the
    /// threshold comparison.
    pub fn decide(&self, metadata: &EntityMetadata, score: f32) -> Verdict {
        if metadata.detection() == DetectionMethod::Hash {
            return Verdict::Malicious;
        }
        let raw = if score >= self.threshold {
            Verdict::Malicious
        } else {
            Verdict::Benign
        };
        if let EntityMetadata::File(file) = metadata {
            if safe_extension(&file.file_name) {
                return Verdict::Benign;
            }
        }
        raw
    }
}
