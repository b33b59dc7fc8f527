//! Ingest API binary entry point

use scooper_watch_analyzer::{AnalyzerConfig, PipelineDeps, SessionManager};
use scooper_watch_api_server::{start_server, ApiState};
use scooper_watch_clients::{
    CachedRoiProvider, DetectorConfig, HttpDetectorClient, HttpRoiStoreClient, RoiStoreConfig,
};
use scooper_watch_storage::{
    EventPublisher, FilesystemFrameStore, HttpBrokerPublisher, HttpViolationStore, NoopPublisher,
    ViolationStoreConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scooper_watch_api_server=info,scooper_watch_analyzer=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("API_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8003".to_string());
    let config = AnalyzerConfig::from_env();

    // External collaborators
    let detector = HttpDetectorClient::new(DetectorConfig::default())?;
    let roi_config = RoiStoreConfig::default();
    let rois = CachedRoiProvider::new(
        HttpRoiStoreClient::new(&roi_config)?,
        Duration::from_secs(roi_config.max_snapshot_age_secs),
    );
    let violations = HttpViolationStore::new(ViolationStoreConfig::default())?;
    let frames = FilesystemFrameStore::from_env();

    // The broker is optional; without one, events are dropped quietly
    let publisher: Arc<dyn EventPublisher> = match std::env::var("BROKER_URL") {
        Ok(url) => Arc::new(HttpBrokerPublisher::new(url)?),
        Err(_) => Arc::new(NoopPublisher),
    };

    let deps = PipelineDeps {
        detector: Arc::new(detector),
        rois: Arc::new(rois),
        frames: Arc::new(frames),
        violations: Arc::new(violations),
        publisher,
    };

    let manager = Arc::new(SessionManager::new(deps, config));
    let state = ApiState::new(manager);

    tracing::info!("Starting violation analysis pipeline");
    start_server(&addr, state).await?;

    Ok(())
}
