//! Persistence layer for violation events
//!
//! This module provides interfaces and implementations for persisting what
//! the pipeline produces:
//! - **Frame store (filesystem)**: annotated violation JPEGs plus JSON
//!   evidence sidecars, laid out per capture session
//! - **Violation store (HTTP)**: structured violation records posted to the
//!   violation database service
//! - **Event publisher (HTTP)**: best-effort notification of downstream
//!   consumers over the message bus
//!
//! All backends sit behind traits so the session worker can be exercised
//! with in-memory fakes.

use scooper_watch_common::{BoundingBox, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod frame_store;
pub mod publisher;
pub mod violation_store;

pub use frame_store::{FilesystemFrameStore, FrameStore, StoredFrame};
pub use publisher::{EventPublisher, HttpBrokerPublisher, NoopPublisher, VIOLATION_DETECTED_TOPIC};
pub use violation_store::{HttpViolationStore, ViolationStore, ViolationStoreConfig};

/// Storage layer errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned status {0}")]
    Status(u16),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether a retry could plausibly succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status(code) => *code >= 500,
            Self::Serialization(_) => false,
            Self::Io(_) => true,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Violation record posted to the violation store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Capture session the violation belongs to
    pub session_id: String,

    /// Associated worker, when one could be labeled
    pub worker_id: Option<u32>,

    /// Name of the ROI zone where the violation occurred
    pub roi_zone_id: String,

    /// Frame number within the session
    pub frame_number: u64,

    /// Path of the persisted annotated frame, if one was written
    pub frame_path: Option<String>,

    /// Inline base64 JPEG of the annotated frame, if available
    pub frame_base64: Option<String>,

    /// Violation type label, e.g. `hand_without_scooper`
    pub violation_type: String,

    /// Detection confidence behind the violation (0.0 to 1.0)
    pub confidence: f32,

    /// Severity label: low, medium or high
    pub severity: String,

    /// Human-readable description
    pub description: String,

    /// Bounding boxes involved in the violation
    pub bounding_boxes: Vec<BoundingBox>,

    /// Center of the offending hand
    pub hand_position: Point,

    /// Whether any scooper was visible in the frame
    pub scooper_present: bool,

    /// Distance to the closest scooper, if any was visible
    pub scooper_distance: Option<f32>,

    /// Classified worker action at violation time
    pub movement_pattern: Option<String>,
}
