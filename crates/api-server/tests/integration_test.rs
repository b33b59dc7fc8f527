//! Integration tests for the ingest API
//!
//! These tests start the server with in-memory collaborators, send real
//! requests, and verify responses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scooper_watch_analyzer::{AnalyzerConfig, PipelineDeps, SessionManager};
use scooper_watch_api_server::{start_server, ApiState};
use scooper_watch_clients::{ClientError, DetectorApi, RoiProvider};
use scooper_watch_common::{BoundingBox, Detection, Roi, RoiShape, SourceInfo};
use scooper_watch_storage::{
    EventPublisher, FrameStore, StorageResult, StoredFrame, ViolationRecord, ViolationStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

struct EmptyDetector;

#[async_trait]
impl DetectorApi for EmptyDetector {
    async fn detect(
        &self,
        _frame_id: &str,
        _jpeg_bytes: &[u8],
        _timestamp: DateTime<Utc>,
        _source_info: &SourceInfo,
    ) -> Result<Vec<Detection>, ClientError> {
        Ok(Vec::new())
    }
}

struct StaticRois;

#[async_trait]
impl RoiProvider for StaticRois {
    async fn current_rois(&self) -> Result<Vec<Roi>, ClientError> {
        Ok(vec![Roi {
            name: "sauce_station".to_string(),
            shape: RoiShape::Rectangle {
                bounds: BoundingBox::new(500.0, 400.0, 200.0, 200.0),
            },
            requires_scooper: true,
            ingredient_type: "sauce".to_string(),
        }])
    }
}

#[derive(Default)]
struct NullFrameStore;

#[async_trait]
impl FrameStore for NullFrameStore {
    async fn write_frame(
        &self,
        session_id: &str,
        frame_id: &str,
        _timestamp: DateTime<Utc>,
        _jpeg_bytes: &[u8],
        _sidecar: &serde_json::Value,
    ) -> StorageResult<StoredFrame> {
        let path = PathBuf::from(format!("{session_id}/{frame_id}.jpg"));
        Ok(StoredFrame {
            sidecar_path: PathBuf::from(format!("{}.json", path.display())),
            frame_path: path,
        })
    }
}

#[derive(Default)]
struct MemoryViolationStore {
    records: Mutex<Vec<ViolationRecord>>,
}

#[async_trait]
impl ViolationStore for MemoryViolationStore {
    async fn store(&self, record: &ViolationRecord) -> StorageResult<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

struct SilentPublisher;

#[async_trait]
impl EventPublisher for SilentPublisher {
    async fn publish(&self, _topic: &str, _payload: serde_json::Value, _priority: &str) {}
}

fn test_state(store: Arc<MemoryViolationStore>) -> ApiState {
    let deps = PipelineDeps {
        detector: Arc::new(EmptyDetector),
        rois: Arc::new(StaticRois),
        frames: Arc::new(NullFrameStore),
        violations: store,
        publisher: Arc::new(SilentPublisher),
    };
    ApiState::new(Arc::new(SessionManager::new(
        deps,
        AnalyzerConfig::default(),
    )))
}

fn frame_body(frame_id: &str, frame_number: u64) -> serde_json::Value {
    serde_json::json!({
        "frame_id": frame_id,
        "session_id": "session_itest",
        "timestamp": "2024-06-01T12:00:00Z",
        "frame_number": frame_number,
        "source_info": {
            "type": "file",
            "path": "/videos/line1.mp4",
            "fps": 10.0,
            "resolution": [1280, 720]
        },
        "detections": [
            {
                "class_name": "hand",
                "confidence": 0.9,
                "bbox": {"x": 490.0, "y": 390.0, "width": 60.0, "height": 60.0}
            }
        ]
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let store = Arc::new(MemoryViolationStore::default());
    let state = test_state(Arc::clone(&store));
    tokio::spawn(async move {
        start_server("127.0.0.1:18091", state)
            .await
            .expect("Failed to start server");
    });
    sleep(Duration::from_millis(200)).await;

    let response = reqwest::get("http://127.0.0.1:18091/health")
        .await
        .expect("health request failed");
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn test_frame_ingest_and_stats() {
    let store = Arc::new(MemoryViolationStore::default());
    let state = test_state(Arc::clone(&store));
    tokio::spawn(async move {
        start_server("127.0.0.1:18092", state)
            .await
            .expect("Failed to start server");
    });
    sleep(Duration::from_millis(200)).await;

    let client = reqwest::Client::new();
    let response = client
        .post("http://127.0.0.1:18092/api/v1/frames")
        .json(&frame_body("frame_1", 1))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["session_id"], "session_itest");

    // The hand entered the ROI with no scooper in sight: one violation
    sleep(Duration::from_millis(300)).await;
    assert_eq!(store.records.lock().await.len(), 1);

    let stats: serde_json::Value = client
        .get("http://127.0.0.1:18092/api/v1/sessions/session_itest/stats")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["frames_analyzed"], 1);
    assert_eq!(stats["violations_total"], 1);
    assert_eq!(stats["halted"], false);
}

#[tokio::test]
async fn test_rejects_frame_without_payload() {
    let store = Arc::new(MemoryViolationStore::default());
    let state = test_state(store);
    tokio::spawn(async move {
        start_server("127.0.0.1:18093", state)
            .await
            .expect("Failed to start server");
    });
    sleep(Duration::from_millis(200)).await;

    let mut body = frame_body("frame_1", 1);
    body.as_object_mut().unwrap().remove("detections");

    let response = reqwest::Client::new()
        .post("http://127.0.0.1:18093/api/v1/frames")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_unknown_session_stats_404() {
    let store = Arc::new(MemoryViolationStore::default());
    let state = test_state(store);
    tokio::spawn(async move {
        start_server("127.0.0.1:18094", state)
            .await
            .expect("Failed to start server");
    });
    sleep(Duration::from_millis(200)).await;

    let response = reqwest::get("http://127.0.0.1:18094/api/v1/sessions/nope/stats")
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
