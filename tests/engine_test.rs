//! End-to-end engine scans with stub classifiers and log sources: hash
//! short-circuit, whitelist override, degraded sources, registry reload.

use chrono::Utc;
use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use varanus::collectors::{AuditRecord, LogSource, LogSourceError};
use varanus::engine::{ScanEngine, ScanMode, ScanOutcome};
use varanus::error::{DiagnosticKind, ScanError, ScoreError};
use varanus::model::{Classifier, FeatureScaler, Scorer};
use varanus::policy::Verdict;
use varanus::report::{DetectionMethod, EntityMetadata, ScanDomain};
use varanus::{EngineConfig, FEATURE_DIM};

struct FixedScore(f32);

impl Classifier for FixedScore {
    fn predict_proba(&self, batch: Array2<f32>) -> Result<Vec<f32>, ScoreError> {
        Ok(vec![self.0; batch.nrows()])
    }
}

struct RefusingClassifier;

impl Classifier for RefusingClassifier {
    fn predict_proba(&self, _batch: Array2<f32>) -> Result<Vec<f32>, ScoreError> {
        Err(ScoreError::Inference("session unavailable".into()))
    }
}

struct FixedEvents(Vec<AuditRecord>);

impl LogSource for FixedEvents {
    fn read_recent(&self, limit: usize) -> Result<Vec<AuditRecord>, LogSourceError> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

struct ClosedLog;

impl LogSource for ClosedLog {
    fn read_recent(&self, _limit: usize) -> Result<Vec<AuditRecord>, LogSourceError> {
        Err(LogSourceError::Unavailable("event log unavailable".into()))
    }
}

fn engine_with(classifier: Box<dyn Classifier>, hash_list: &Path, threshold: f32) -> ScanEngine {
    let scaler = FeatureScaler::new(vec![0.0; FEATURE_DIM], vec![1.0; FEATURE_DIM]).unwrap();
    let scorer = Scorer::new(scaler, classifier);
    let mut config = EngineConfig::default();
    config.hash_list_path = hash_list.to_path_buf();
    config.threshold = threshold;
    ScanEngine::new(&config, Arc::new(scorer))
}

fn digest_of(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

fn audit_event(event_id: u32, source_name: &str) -> AuditRecord {
    AuditRecord {
        event_id,
        event_type: 2,
        source_name: source_name.to_string(),
        time_generated: Utc::now(),
        event_category: 0,
        string_inserts: vec!["SYSTEM".into()],
        data: Vec::new(),
    }
}

#[test]
fn hash_listed_file_short_circuits_the_classifier() {
    let dir = tempfile::tempdir().unwrap();
    let payload = dir.path().join("payload.bin");
    fs::write(&payload, b"#!/bin/sh\nrm -rf /\n").unwrap();
    let hash_list = dir.path().join("hashes.txt");
    fs::write(&hash_list, digest_of(b"#!/bin/sh\nrm -rf /\n")).unwrap();

    // benign-scoring classifier: only the digest can flag this file
    let engine = engine_with(Box::new(FixedScore(0.0)), &hash_list, 0.9);
    let outcome = engine.scan_files(&payload, ScanMode::Classic).unwrap();

    assert!(matches!(outcome, ScanOutcome::Clean(_)));
    let records = outcome.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].conclusion, Verdict::Malicious);
    assert_eq!(records[0].threat_score, 1.0);
    assert!(records[0].feature_vector.is_empty());
    match &records[0].metadata {
        EntityMetadata::File(f) => {
            assert_eq!(f.detection, DetectionMethod::Hash);
            assert_eq!(f.digest.as_deref(), Some(digest_of(b"#!/bin/sh\nrm -rf /\n").as_str()));
        }
        other => panic!("expected file metadata, got {other:?}"),
    }
}

#[test]
fn whitelisted_extension_overrides_a_high_score() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("image.png"), b"not actually a png").unwrap();
    let hash_list = dir.path().join("hashes.txt");

    let engine = engine_with(Box::new(FixedScore(0.97)), &hash_list, 0.9);
    let outcome = engine.scan_files(dir.path(), ScanMode::Classic).unwrap();

    let records = outcome.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].conclusion, Verdict::Benign);
    assert_eq!(records[0].threat_score, 0.97);
    assert_eq!(records[0].scan_type, ScanDomain::File);
}

#[test]
fn executable_at_or_above_threshold_is_malicious() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("tool.exe"), b"MZ").unwrap();
    let hash_list = dir.path().join("hashes.txt");

    let engine = engine_with(Box::new(FixedScore(0.9)), &hash_list, 0.9);
    let outcome = engine.scan_files(dir.path(), ScanMode::Classic).unwrap();

    let records = outcome.records();
    assert_eq!(records.len(), 1);
    // score equal to the threshold flags
    assert_eq!(records[0].conclusion, Verdict::Malicious);
    assert_eq!(records[0].feature_vector.len(), FEATURE_DIM);
}

#[test]
fn missing_target_fails_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let hash_list = dir.path().join("hashes.txt");
    let engine = engine_with(Box::new(FixedScore(0.0)), &hash_list, 0.9);

    let err = engine
        .scan_files(&dir.path().join("no-such-entry"), ScanMode::Classic)
        .unwrap_err();
    assert!(matches!(err, ScanError::TargetNotFound { .. }));
}

#[test]
fn digests_added_between_scans_take_effect() {
    let dir = tempfile::tempdir().unwrap();
    let payload = dir.path().join("dropper.bin");
    fs::write(&payload, b"stage two").unwrap();
    let hash_list = dir.path().join("hashes.txt");
    fs::write(&hash_list, "").unwrap();

    let engine = engine_with(Box::new(FixedScore(0.1)), &hash_list, 0.9);

    let first = engine.scan_files(&payload, ScanMode::Classic).unwrap();
    let reported_digest = match &first.records()[0].metadata {
        EntityMetadata::File(f) => f.digest.clone().unwrap(),
        other => panic!("expected file metadata, got {other:?}"),
    };
    assert_eq!(first.records()[0].conclusion, Verdict::Benign);

    let mut list = fs::OpenOptions::new().append(true).open(&hash_list).unwrap();
    writeln!(list, "{reported_digest}").unwrap();
    drop(list);

    let second = engine.scan_files(&payload, ScanMode::Classic).unwrap();
    assert_eq!(second.records()[0].conclusion, Verdict::Malicious);
    assert_eq!(
        second.records()[0].metadata.detection(),
        DetectionMethod::Hash
    );
}

#[test]
fn rescans_repeat_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("report.bin"), b"quarterly numbers").unwrap();
    let hash_list = dir.path().join("hashes.txt");

    let engine = engine_with(Box::new(FixedScore(0.42)), &hash_list, 0.9);
    let first = engine.scan_files(dir.path(), ScanMode::Classic).unwrap();
    let second = engine.scan_files(dir.path(), ScanMode::Classic).unwrap();

    assert_eq!(first.records().len(), 1);
    assert_eq!(second.records().len(), 1);
    assert_eq!(first.records()[0].conclusion, second.records()[0].conclusion);
    assert_eq!(
        first.records()[0].threat_score,
        second.records()[0].threat_score
    );
    assert_eq!(
        first.records()[0].feature_vector,
        second.records()[0].feature_vector
    );
    assert_eq!(first.records()[0].metadata, second.records()[0].metadata);
}

#[test]
fn scoring_failure_keeps_hash_records_and_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("known.bin"), b"known bad").unwrap();
    fs::write(dir.path().join("unknown.bin"), b"unknown").unwrap();
    let hash_list = dir.path().join("hashes.txt");
    fs::write(&hash_list, digest_of(b"known bad")).unwrap();

    let engine = engine_with(Box::new(RefusingClassifier), &hash_list, 0.9);
    let outcome = engine.scan_files(dir.path(), ScanMode::Classic).unwrap();

    assert!(matches!(outcome, ScanOutcome::Degraded { .. }));
    let records = outcome.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metadata.detection(), DetectionMethod::Hash);
    assert!(outcome
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::ScoringFailure));
}

#[test]
fn log_scan_reports_masked_event_ids() {
    let dir = tempfile::tempdir().unwrap();
    let hash_list = dir.path().join("hashes.txt");
    let source = FixedEvents(vec![
        audit_event(0x0001_1209, "Microsoft-Windows-Security-Auditing"),
        audit_event(4625, "Microsoft-Windows-Security-Auditing"),
    ]);

    let engine = engine_with(Box::new(FixedScore(0.2)), &hash_list, 0.9)
        .with_log_source(Box::new(source), 50);
    let outcome = engine.scan_logs(ScanMode::Classic).unwrap();

    let records = outcome.records();
    assert_eq!(records.len(), 2);
    match &records[0].metadata {
        EntityMetadata::Log(l) => assert_eq!(l.event_id, 4617),
        other => panic!("expected log metadata, got {other:?}"),
    }
    assert!(records
        .iter()
        .all(|r| r.scan_type == ScanDomain::Log && r.feature_vector.len() == FEATURE_DIM));
}

#[test]
fn unreadable_log_source_degrades_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let hash_list = dir.path().join("hashes.txt");

    let engine = engine_with(Box::new(FixedScore(0.2)), &hash_list, 0.9)
        .with_log_source(Box::new(ClosedLog), 50);
    let outcome = engine.scan_logs(ScanMode::Classic).unwrap();

    assert!(outcome.records().is_empty());
    let diagnostics = outcome.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::SourceUnavailable);
}

#[test]
fn process_scan_covers_the_whole_table() {
    let dir = tempfile::tempdir().unwrap();
    let hash_list = dir.path().join("hashes.txt");

    let engine = engine_with(Box::new(FixedScore(0.05)), &hash_list, 0.9);
    let outcome = engine.scan_processes(ScanMode::Classic).unwrap();

    let records = outcome.records();
    assert!(!records.is_empty());
    assert!(records
        .iter()
        .all(|r| r.scan_type == ScanDomain::Process && r.feature_vector.len() == FEATURE_DIM));
    // every record is a verdict, benign ones included
    assert!(records.iter().all(|r| r.conclusion == Verdict::Benign));
}
