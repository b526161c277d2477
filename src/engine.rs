//! Scan orchestration. One engine instance serves all scan requests: it owns
//! the collectors and hash registry, shares the read-only scorer, and walks
//! each request through collect → score → decide → assemble.

use crate::collectors::{Collection, FileCollector, LogCollector, LogSource, ProcessCollector};
use crate::config::EngineConfig;
use crate::error::{Diagnostic, ScanError};
use crate::features::FeatureVector;
use crate::model::Scorer;
use crate::policy::{DecisionPolicy, Verdict};
use crate::registry::HashRegistry;
use crate::report::{DetectionMethod, ScanDomain, ThreatRecord};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Requested scoring mode. Accepted on every operation and carried through
/// for the day a second artifact pair exists; today both names resolve to the
/// single loaded classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Classic,
    Quantum,
}

impl ScanMode {
    /// Unrecognized names fall back to classic rather than erroring.
    pub fn from_name(name: &str) -> Self {
        match name {
            "quantum" => ScanMode::Quantum,
            _ => ScanMode::Classic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScanMode::Classic => "classic",
            ScanMode::Quantum => "quantum",
        }
    }
}

/// Per-request lifecycle. `Failed` is reachable only from `Collecting`, and
/// only for a missing file-scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Pending,
    Collecting,
    Scoring,
    Deciding,
    Complete,
    Failed,
}

/// A finished scan: every record, plus diagnostics when any source degraded.
/// Hard failure is the `Err` arm of the scan call itself.
#[derive(Debug)]
pub enum ScanOutcome {
    Clean(Vec<ThreatRecord>),
    Degraded {
        records: Vec<ThreatRecord>,
        diagnostics: Vec<Diagnostic>,
    },
}

impl ScanOutcome {
    pub fn records(&self) -> &[ThreatRecord] {
        match self {
            ScanOutcome::Clean(records) => records,
            ScanOutcome::Degraded { records, .. } => records,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ScanOutcome::Clean(_) => &[],
            ScanOutcome::Degraded { diagnostics, .. } => diagnostics,
        }
    }

    pub fn into_parts(self) -> (Vec<ThreatRecord>, Vec<Diagnostic>) {
        match self {
            ScanOutcome::Clean(records) => (records, Vec::new()),
            ScanOutcome::Degraded {
                records,
                diagnostics,
            } => (records, diagnostics),
        }
    }
}

pub struct ScanEngine {
    scorer: Arc<Scorer>,
    registry: HashRegistry,
    policy: DecisionPolicy,
    processes: ProcessCollector,
    files: FileCollector,
    logs: LogCollector,
}

impl ScanEngine {
    pub fn new(config: &EngineConfig, scorer: Arc<Scorer>) -> Self {
        Self {
            scorer,
            registry: HashRegistry::new(&config.hash_list_path),
            policy: DecisionPolicy::new(config.threshold),
            processes: ProcessCollector::new(),
            files: FileCollector::new(),
            logs: LogCollector::platform(config.scan.max_log_events),
        }
    }

    /// Swap the audit log source, preserving the configured event limit
    /// semantics of [`LogCollector`].
    pub fn with_log_source(mut self, source: Box<dyn LogSource>, limit: usize) -> Self {
        self.logs = LogCollector::new(source, limit);
        self
    }

    pub fn registry(&self) -> &HashRegistry {
        &self.registry
    }

    pub fn scan_processes(&self, mode: ScanMode) -> Result<ScanOutcome, ScanError> {
        let scan = ScanContext::begin(ScanDomain::Process, mode);
        scan.enter(ScanPhase::Collecting);
        let collected = self.processes.collect();
        Ok(self.finish(&scan, collected))
    }

    /// The registry is re-read before every file scan so appended digests take
    /// effect; the snapshot taken here then holds for the whole scan.
    pub fn scan_files(&self, target: &Path, mode: ScanMode) -> Result<ScanOutcome, ScanError> {
        let scan = ScanContext::begin(ScanDomain::File, mode);
        scan.enter(ScanPhase::Collecting);

        let mut reload_diagnostics = Vec::new();
        if let Err(e) = self.registry.reload() {
            tracing::warn!(
                path = %self.registry.path().display(),
                error = %e,
                "hash list unreadable; continuing with previous set"
            );
            reload_diagnostics.push(Diagnostic::source_unavailable(format!(
                "hash list unreadable: {e}"
            )));
        }
        let snapshot = self.registry.snapshot();

        let mut collected = match self.files.collect(target, &snapshot) {
            Ok(collected) => collected,
            Err(e) => {
                scan.enter(ScanPhase::Failed);
                tracing::warn!(scan_id = %scan.id, error = %e, "file scan failed");
                return Err(e);
            }
        };
        collected.diagnostics.extend(reload_diagnostics);
        Ok(self.finish(&scan, collected))
    }

    pub fn scan_logs(&self, mode: ScanMode) -> Result<ScanOutcome, ScanError> {
        let scan = ScanContext::begin(ScanDomain::Log, mode);
        scan.enter(ScanPhase::Collecting);
        let collected = self.logs.collect();
        Ok(self.finish(&scan, collected))
    }

    /// Score and decide. Hash-matched entities bypass the scorer; everything
    /// else goes through in one batch. A scoring failure drops the scored
    /// portion and keeps the hash-matched records, with a diagnostic saying so.
    fn finish(&self, scan: &ScanContext, collected: Collection) -> ScanOutcome {
        let Collection {
            entries,
            mut diagnostics,
        } = collected;

        scan.enter(ScanPhase::Scoring);
        let timestamp = Utc::now();
        let to_score: Vec<FeatureVector> = entries
            .iter()
            .filter(|(_, metadata)| metadata.detection() != DetectionMethod::Hash)
            .map(|(vector, _)| *vector)
            .collect();
        let scores = match self.scorer.score(&to_score) {
            Ok(scores) => Some(scores),
            Err(e) => {
                tracing::warn!(scan_id = %scan.id, error = %e, "scoring failed; classifier-path entities dropped");
                diagnostics.push(Diagnostic::scoring_failure(e.to_string()));
                None
            }
        };

        scan.enter(ScanPhase::Deciding);
        let mut records = Vec::with_capacity(entries.len());
        let mut score_iter = scores.as_ref().map(|s| s.iter());
        for (vector, metadata) in entries {
            if metadata.detection() == DetectionMethod::Hash {
                records.push(ThreatRecord {
                    threat_score: 1.0,
                    scan_type: scan.domain,
                    timestamp,
                    feature_vector: Vec::new(),
                    conclusion: Verdict::Malicious,
                    metadata,
                });
                continue;
            }
            let Some(&score) = score_iter.as_mut().and_then(|it| it.next()) else {
                continue;
            };
            let conclusion = self.policy.decide(&metadata, score);
            records.push(ThreatRecord {
                threat_score: score,
                scan_type: scan.domain,
                timestamp,
                feature_vector: vector.to_vec(),
                conclusion,
                metadata,
            });
        }

        let malicious = records
            .iter()
            .filter(|r| r.conclusion == Verdict::Malicious)
            .count();
        tracing::info!(
            scan_id = %scan.id,
            domain = ?scan.domain,
            records = records.len(),
            malicious,
            degraded = !diagnostics.is_empty(),
            "scan complete"
        );
        scan.enter(ScanPhase::Complete);

        if diagnostics.is_empty() {
            ScanOutcome::Clean(records)
        } else {
            ScanOutcome::Degraded {
                records,
                diagnostics,
            }
        }
    }
}

struct ScanContext {
    id: Uuid,
    domain: ScanDomain,
}

impl ScanContext {
    fn begin(domain: ScanDomain, mode: ScanMode) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(
            scan_id = %id,
            domain = ?domain,
            mode = mode.name(),
            phase = ?ScanPhase::Pending,
            "scan opened"
        );
        Self { id, domain }
    }

    fn enter(&self, phase: ScanPhase) {
        tracing::debug!(scan_id = %self.id, phase = ?phase, "scan phase");
    }
}
