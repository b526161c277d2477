//! Feature collectors: one per scan domain. Each emits (feature vector,
//! metadata) pairs in a stable enumeration order; per-entity failures skip
//! the entity, total source failure degrades to an empty collection plus a
//! diagnostic.

mod file;
mod log;
mod process;

use crate::error::Diagnostic;
use crate::features::FeatureVector;
use crate::report::EntityMetadata;

pub use file::FileCollector;
pub use log::{AuditRecord, LogCollector, LogSource, LogSourceError, SecurityEventLog, MAX_LOG_EVENTS};
pub use process::ProcessCollector;

/// What one collector run produced. `entries` preserve the collector's
/// enumeration order; `diagnostics` explain any degradation.
#[derive(Debug, Default)]
pub struct Collection {
    pub entries: Vec<(FeatureVector, EntityMetadata)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Collection {
    pub fn degraded(diagnostic: Diagnostic) -> Self {
        Self {
            entries: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }
}
