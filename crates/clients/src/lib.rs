//! HTTP clients for the pipeline's external collaborators
//!
//! - [`detector`]: the stateless object-detection service (`POST /detect`)
//! - [`rois`]: the ROI store (`GET /rois`) with a stale-tolerant snapshot
//!   cache
//!
//! All clients share the same transient-failure policy: at most two retries
//! with a 200 ms backoff, then the caller's safe fallback applies.

pub mod detector;
pub mod rois;

use std::time::Duration;
use thiserror::Error;

pub use detector::{DetectorApi, DetectorConfig, HttpDetectorClient};
pub use rois::{CachedRoiProvider, HttpRoiStoreClient, RoiProvider, RoiStoreConfig};

/// Retries after the initial attempt
pub(crate) const RETRY_ATTEMPTS: usize = 2;
/// Pause between attempts
pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Client-side errors talking to external services
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {0}")]
    Status(u16),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("No ROI snapshot available: {0}")]
    NoSnapshot(String),
}

impl ClientError {
    /// Whether a retry could plausibly succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status(code) => *code >= 500,
            Self::Decode(_) | Self::NoSnapshot(_) => false,
        }
    }
}
