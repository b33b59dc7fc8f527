//! API request and response types

use chrono::{DateTime, Utc};
use scooper_watch_analyzer::SessionStats;
use scooper_watch_common::SourceInfo;
use serde::{Deserialize, Serialize};

/// Frame pushed by the frame source for analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeFrameRequest {
    /// Unique, monotonic per session
    pub frame_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    /// Base64-encoded JPEG; optional in analyze-only mode
    #[serde(default)]
    pub frame_data: Option<String>,
    pub frame_number: u64,
    pub source_info: SourceInfo,
    /// Pre-computed detections for analyze-only submissions; the detector
    /// service is not called when these are present
    #[serde(default)]
    pub detections: Option<Vec<DetectionDto>>,
}

/// Detection supplied inline with an analyze-only submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionDto {
    pub class_name: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    pub bbox: BboxDto,
}

/// Bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BboxDto {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Acknowledgement of a queued frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeFrameResponse {
    pub frame_id: String,
    pub session_id: String,
    pub status: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
}

/// Per-session statistics response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatsResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub stats: SessionStats,
}

/// Error body returned by all endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
