//! Best-effort event publication
//!
//! Pushes violation events onto the message bus through the broker
//! service's HTTP facade. Publication is advisory: failures are logged and
//! never propagate into the pipeline.

use crate::StorageResult;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Routing key for violation events
pub const VIOLATION_DETECTED_TOPIC: &str = "violation.detected";

/// Contract for publishing pipeline events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event; implementations must not fail the caller
    async fn publish(&self, topic: &str, payload: serde_json::Value, priority: &str);
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    routing_key: &'a str,
    message: serde_json::Value,
    priority: &'a str,
}

/// Publisher posting to the broker service's HTTP endpoint
pub struct HttpBrokerPublisher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBrokerPublisher {
    pub fn new(base_url: impl Into<String>) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl EventPublisher for HttpBrokerPublisher {
    async fn publish(&self, topic: &str, payload: serde_json::Value, priority: &str) {
        let request = PublishRequest {
            routing_key: topic,
            message: payload,
            priority,
        };

        let result = self
            .http
            .post(format!("{}/publish", self.base_url))
            .json(&request)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(topic, "event published");
            }
            Ok(response) => {
                warn!(topic, status = %response.status(), "broker rejected event");
            }
            Err(e) => {
                warn!(topic, error = %e, "event publication failed");
            }
        }
    }
}

/// Publisher used when no broker is configured
#[derive(Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, topic: &str, _payload: serde_json::Value, _priority: &str) {
        debug!(topic, "no broker configured, event dropped");
    }
}
