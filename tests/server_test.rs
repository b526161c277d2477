//! HTTP surface: route wiring, the success envelope, error status mapping,
//! and the multipart upload path rewrite.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use ndarray::Array2;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;
use varanus::collectors::{AuditRecord, LogSource, LogSourceError};
use varanus::engine::ScanEngine;
use varanus::error::ScoreError;
use varanus::model::{Classifier, FeatureScaler, Scorer};
use varanus::server::{create_router, AppState};
use varanus::{EngineConfig, FEATURE_DIM};

struct FixedScore(f32);

impl Classifier for FixedScore {
    fn predict_proba(&self, batch: Array2<f32>) -> Result<Vec<f32>, ScoreError> {
        Ok(vec![self.0; batch.nrows()])
    }
}

struct FixedEvents(Vec<AuditRecord>);

impl LogSource for FixedEvents {
    fn read_recent(&self, limit: usize) -> Result<Vec<AuditRecord>, LogSourceError> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

fn engine_with(score: f32, hash_list: &Path) -> ScanEngine {
    let scaler = FeatureScaler::new(vec![0.0; FEATURE_DIM], vec![1.0; FEATURE_DIM]).unwrap();
    let scorer = Scorer::new(scaler, Box::new(FixedScore(score)));
    let mut config = EngineConfig::default();
    config.hash_list_path = hash_list.to_path_buf();
    ScanEngine::new(&config, Arc::new(scorer))
}

fn router_for(engine: ScanEngine) -> axum::Router {
    create_router(AppState {
        engine: Arc::new(engine),
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn scan_logs_route_wraps_records_in_the_success_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let source = FixedEvents(vec![AuditRecord {
        event_id: 4625,
        event_type: 2,
        source_name: "Microsoft-Windows-Security-Auditing".into(),
        time_generated: Utc::now(),
        event_category: 0,
        string_inserts: vec!["SYSTEM".into()],
        data: Vec::new(),
    }]);
    let engine =
        engine_with(0.2, &dir.path().join("hashes.txt")).with_log_source(Box::new(source), 50);

    let response = router_for(engine)
        .oneshot(
            Request::builder()
                .uri("/scan_logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["threats"].as_array().unwrap().len(), 1);
    assert_eq!(json["threats"][0]["scan_type"], "log");
    assert_eq!(json["threats"][0]["event_id"], 4625);
    assert_eq!(json["diagnostics"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn scan_files_route_scans_the_given_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("image.png"), b"pixels").unwrap();
    let engine = engine_with(0.97, &dir.path().join("hashes.txt"));

    let response = router_for(engine)
        .oneshot(
            Request::builder()
                .uri(format!("/scan_files?path={}", dir.path().display()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    // whitelisted extension stays benign despite the score
    assert_eq!(json["threats"][0]["conclusion"], "benign");
    assert_eq!(json["threats"][0]["detection"], "ml");
}

#[tokio::test]
async fn missing_scan_target_maps_to_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(0.2, &dir.path().join("hashes.txt"));

    let response = router_for(engine)
        .oneshot(
            Request::builder()
                .uri("/scan_files?path=/definitely/not/here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn upload_scan_rewrites_records_to_the_original_path() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(0.95, &dir.path().join("hashes.txt"));

    let boundary = "varanus-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"invoice.exe\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         MZ fake executable\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"original_path\"\r\n\r\n\
         C:/Users/kim/Downloads/invoice.exe\r\n\
         --{boundary}--\r\n"
    );

    let response = router_for(engine)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scan_file")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    let threats = json["threats"].as_array().unwrap();
    assert_eq!(threats.len(), 1);
    assert_eq!(
        threats[0]["original_path"],
        "C:/Users/kim/Downloads/invoice.exe"
    );
    // the scanned temp file, not the client path
    assert_ne!(
        threats[0]["file_path"],
        "C:/Users/kim/Downloads/invoice.exe"
    );
    assert_eq!(threats[0]["conclusion"], "malicious");
}

#[tokio::test]
async fn upload_larger_than_the_extractor_default_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(0.1, &dir.path().join("hashes.txt"));

    // 3 MiB payload, past the multipart extractor's 2 MB default cap
    let boundary = "varanus-test-boundary";
    let mut body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"setup.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.resize(body.len() + 3 * 1024 * 1024, b'a');
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = router_for(engine)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scan_file")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["threats"].as_array().unwrap().len(), 1);
    assert_eq!(json["threats"][0]["conclusion"], "benign");
}

#[tokio::test]
async fn upload_without_a_file_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(0.2, &dir.path().join("hashes.txt"));

    let boundary = "varanus-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"original_path\"\r\n\r\n\
         C:/Users/kim/Downloads/invoice.exe\r\n\
         --{boundary}--\r\n"
    );

    let response = router_for(engine)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scan_file")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
}
