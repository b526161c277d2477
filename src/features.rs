//! Fixed-width feature encoding. Every domain encodes to exactly
//! [`FEATURE_DIM`] floats; the positional layout is what the classifier and
//! scaler were fitted against, so `encode` is the only place it is spelled out.

use serde::{Deserialize, Serialize};

/// Width of every feature vector, regardless of scan domain.
pub const FEATURE_DIM: usize = 8;

/// Ordered feature values for one scanned entity. Construction sanitizes
/// non-finite inputs to 0.0 so NaN/inf never reach the scaler or classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f32; FEATURE_DIM],
}

impl FeatureVector {
    pub fn new(values: [f32; FEATURE_DIM]) -> Self {
        let mut values = values;
        for v in &mut values {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        Self { values }
    }

    pub fn zeroed() -> Self {
        Self {
            values: [0.0; FEATURE_DIM],
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.values.to_vec()
    }
}

fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Features of one running process.
#[derive(Debug, Clone)]
pub struct ProcessFeatures {
    /// OS process id
    pub pid: u32,
    /// Process name length in bytes
    pub name_len: usize,
    /// Runs as a system account (name contains SYSTEM, or root)
    pub system_user: bool,
    /// CPU usage percent at snapshot time
    pub cpu_percent: f32,
    /// Resident memory as percent of total
    pub memory_percent: f32,
    /// Open socket count (0 where unavailable)
    pub connection_count: usize,
    /// Executable path ends in `.exe`
    pub exe_extension: bool,
    /// Thread count (0 where unavailable)
    pub thread_count: usize,
}

impl ProcessFeatures {
    pub fn encode(&self) -> FeatureVector {
        FeatureVector::new([
            self.pid as f32,
            self.name_len as f32,
            flag(self.system_user),
            self.cpu_percent,
            self.memory_percent,
            self.connection_count as f32,
            flag(self.exe_extension),
            self.thread_count as f32,
        ])
    }
}

/// Features of one filesystem entry.
#[derive(Debug, Clone)]
pub struct FileFeatures {
    /// File size in bytes
    pub size_bytes: u64,
    /// Name ends in `.exe`, `.dll`, or `.sys`
    pub executable_extension: bool,
    /// Dot-prefixed name
    pub hidden: bool,
    /// mtime minus ctime, seconds
    pub mtime_ctime_delta_secs: f64,
    /// atime minus mtime, seconds
    pub atime_mtime_delta_secs: f64,
    /// File name length in bytes
    pub name_len: usize,
    /// Hard link count
    pub hard_links: u64,
    /// Execute permission bit set for anyone
    pub executable_permission: bool,
}

impl FileFeatures {
    pub fn encode(&self) -> FeatureVector {
        FeatureVector::new([
            self.size_bytes as f32,
            flag(self.executable_extension),
            flag(self.hidden),
            self.mtime_ctime_delta_secs as f32,
            self.atime_mtime_delta_secs as f32,
            self.name_len as f32,
            self.hard_links as f32,
            flag(self.executable_permission),
        ])
    }
}

/// Features of one security-audit log event.
#[derive(Debug, Clone)]
pub struct LogFeatures {
    /// Raw event id; encoding masks it to 16 bits
    pub event_id: u32,
    /// Provider event type code
    pub event_type: u16,
    /// Source name length in bytes
    pub source_len: usize,
    /// Event type is error (1) or warning (2)
    pub error_or_warning: bool,
    /// Total length of all insertion strings, bytes
    pub inserts_len: usize,
    /// Hour of day the event was generated (UTC, 0-23)
    pub hour: u32,
    /// Source name contains SYSTEM
    pub system_source: bool,
    /// Event payload length in bytes
    pub data_len: usize,
}

impl LogFeatures {
    pub fn encode(&self) -> FeatureVector {
        FeatureVector::new([
            (self.event_id & 0xFFFF) as f32,
            self.event_type as f32,
            self.source_len as f32,
            flag(self.error_or_warning),
            self.inserts_len as f32,
            self.hour as f32,
            flag(self.system_source),
            self.data_len as f32,
        ])
    }
}
