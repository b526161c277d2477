//! Engine configuration: artifact paths, decision threshold, scan and server
//! settings. Loaded permissively (missing or unparsable file falls back to
//! defaults) then validated before anything starts.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the ONNX classifier
    pub model_path: PathBuf,
    /// Path to the JSON scaler parameters fitted alongside the classifier
    pub scaler_path: PathBuf,
    /// Path to the newline-delimited known-malicious digest list
    pub hash_list_path: PathBuf,
    /// Malicious-class probability at or above which an entity is flagged (0, 1]
    pub threshold: f32,
    /// Scan behavior
    pub scan: ScanConfig,
    /// HTTP scan surface
    pub server: ServerConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Most recent audit events examined per log scan (hard cap 50)
    pub max_log_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.onnx"),
            scaler_path: PathBuf::from("scaler.json"),
            hash_list_path: PathBuf::from("malware_hashes.txt"),
            threshold: 0.9,
            scan: ScanConfig::default(),
            server: ServerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { max_log_events: 50 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<EngineConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    /// Refuse to start on a threshold outside (0, 1] or an unusable bind
    /// address. Artifact paths are checked later, when the scorer loads.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::BindAddr {
                addr: self.server.bind_addr.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
