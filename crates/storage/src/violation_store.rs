//! Violation store client
//!
//! Posts violation records to the violation database service. Transient
//! failures are retried briefly inline; beyond that the session worker
//! parks the record in its bounded retry queue.

use crate::{StorageError, StorageResult, ViolationRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Retries after the initial attempt
const RETRY_ATTEMPTS: usize = 2;
/// Pause between attempts
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Violation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationStoreConfig {
    /// Base URL of the violation store service
    pub base_url: String,
    /// Hard timeout for one write
    pub timeout_secs: u64,
}

impl Default for ViolationStoreConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("VIOLATION_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:8005".to_string()),
            timeout_secs: 10,
        }
    }
}

/// Contract for persisting violation records
#[async_trait]
pub trait ViolationStore: Send + Sync {
    async fn store(&self, record: &ViolationRecord) -> StorageResult<()>;
}

/// HTTP client for the violation store service
pub struct HttpViolationStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpViolationStore {
    pub fn new(config: ViolationStoreConfig) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    async fn post_once(&self, record: &ViolationRecord) -> StorageResult<()> {
        let response = self
            .http
            .post(format!("{}/violations", self.base_url))
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ViolationStore for HttpViolationStore {
    async fn store(&self, record: &ViolationRecord) -> StorageResult<()> {
        let mut last_err = None;
        for attempt in 0..=RETRY_ATTEMPTS {
            match self.post_once(record).await {
                Ok(()) => {
                    info!(
                        session = %record.session_id,
                        roi = %record.roi_zone_id,
                        "violation record stored"
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                    warn!(attempt, error = %e, "violation store write failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(StorageError::Status(500)))
    }
}
