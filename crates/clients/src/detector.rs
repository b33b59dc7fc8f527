//! Object detector client
//!
//! Sends JPEG frames to the detection service and parses the reply into
//! typed detections. Unknown classes and malformed boxes are logged and
//! skipped rather than failing the frame; missing confidences coerce to
//! zero.

use crate::{ClientError, RETRY_ATTEMPTS, RETRY_BACKOFF};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use scooper_watch_common::{BoundingBox, Detection, DetectionClass, Point, SourceInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Detector client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Hard timeout for one detection call
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            timeout_secs: 10,
        }
    }
}

/// Contract for the stateless object-detection service
#[async_trait]
pub trait DetectorApi: Send + Sync {
    /// Detect objects in one JPEG frame
    async fn detect(
        &self,
        frame_id: &str,
        jpeg_bytes: &[u8],
        timestamp: DateTime<Utc>,
        source_info: &SourceInfo,
    ) -> Result<Vec<Detection>, ClientError>;
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    frame_id: &'a str,
    frame_data: String,
    timestamp: DateTime<Utc>,
    source_info: &'a SourceInfo,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<DetectionDto>,
    #[serde(default)]
    #[allow(dead_code)]
    processing_time_ms: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BboxDto {
    x1: f32,
    y1: f32,
    #[allow(dead_code)]
    x2: f32,
    #[allow(dead_code)]
    y2: f32,
    width: f32,
    height: f32,
}

#[derive(Debug, Deserialize)]
struct CenterDto {
    x: f32,
    y: f32,
}

#[derive(Debug, Deserialize)]
struct DetectionDto {
    class_name: String,
    confidence: Option<f32>,
    bbox: BboxDto,
    center: Option<CenterDto>,
    area: Option<f32>,
}

/// HTTP client for the detection service
pub struct HttpDetectorClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDetectorClient {
    /// Build a client with the configured timeout
    pub fn new(config: DetectorConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    async fn call_once(
        &self,
        request: &DetectRequest<'_>,
    ) -> Result<DetectResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/detect", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        response
            .json::<DetectResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DetectorApi for HttpDetectorClient {
    async fn detect(
        &self,
        frame_id: &str,
        jpeg_bytes: &[u8],
        timestamp: DateTime<Utc>,
        source_info: &SourceInfo,
    ) -> Result<Vec<Detection>, ClientError> {
        let request = DetectRequest {
            frame_id,
            frame_data: BASE64.encode(jpeg_bytes),
            timestamp,
            source_info,
        };

        let mut last_err = None;
        for attempt in 0..=RETRY_ATTEMPTS {
            match self.call_once(&request).await {
                Ok(response) => {
                    let detections = parse_detections(response.detections, frame_id, timestamp);
                    debug!(frame_id, count = detections.len(), "detector reply parsed");
                    return Ok(detections);
                }
                Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                    warn!(frame_id, attempt, error = %e, "detector call failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(ClientError::Status(500)))
    }
}

/// Convert detector DTOs to typed detections, skipping malformed entries
fn parse_detections(
    dtos: Vec<DetectionDto>,
    frame_id: &str,
    timestamp: DateTime<Utc>,
) -> Vec<Detection> {
    let mut detections = Vec::with_capacity(dtos.len());
    for dto in dtos {
        let Some(class) = DetectionClass::parse(&dto.class_name) else {
            warn!(frame_id, class = %dto.class_name, "skipping unknown detection class");
            continue;
        };
        if dto.bbox.width <= 0.0 || dto.bbox.height <= 0.0 {
            warn!(frame_id, class = %dto.class_name, "skipping detection with degenerate bbox");
            continue;
        }

        let bbox = BoundingBox::new(dto.bbox.x1, dto.bbox.y1, dto.bbox.width, dto.bbox.height);
        let center = dto
            .center
            .map_or_else(|| bbox.center(), |c| Point::new(c.x, c.y));
        let area = dto.area.unwrap_or_else(|| bbox.area());

        detections.push(Detection {
            class,
            confidence: dto.confidence.unwrap_or(0.0),
            bbox,
            center,
            area,
            frame_id: frame_id.to_string(),
            timestamp,
        });
    }
    detections
}
