//! ROI store client
//!
//! Fetches the current ROI set and normalizes the store's wire shapes
//! (coordinate lists or rect objects) into typed regions. A caching
//! wrapper keeps the last good snapshot and serves it through short store
//! outages; frames are only skipped once the snapshot goes stale.

use crate::{ClientError, RETRY_ATTEMPTS, RETRY_BACKOFF};
use async_trait::async_trait;
use scooper_watch_common::{BoundingBox, Point, Roi, RoiShape};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// ROI store client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiStoreConfig {
    /// Base URL of the ROI store
    pub base_url: String,
    /// Hard timeout for one fetch
    pub timeout_secs: u64,
    /// How long a stale snapshot may substitute for a failed fetch
    pub max_snapshot_age_secs: u64,
}

impl Default for RoiStoreConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("ROI_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:8004".to_string()),
            timeout_secs: 5,
            max_snapshot_age_secs: 60,
        }
    }
}

/// Contract for fetching the current ROI set
#[async_trait]
pub trait RoiProvider: Send + Sync {
    async fn current_rois(&self) -> Result<Vec<Roi>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct RoiResponse {
    data: Vec<RoiDto>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CoordinatesDto {
    Points(Vec<[f32; 2]>),
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Deserialize)]
struct RoiDto {
    name: String,
    #[serde(default = "default_shape")]
    shape: String,
    coordinates: CoordinatesDto,
    #[serde(default = "default_requires_scooper")]
    requires_scooper: bool,
    #[serde(default = "default_ingredient_type")]
    ingredient_type: String,
}

fn default_shape() -> String {
    "rectangle".to_string()
}

fn default_requires_scooper() -> bool {
    true
}

fn default_ingredient_type() -> String {
    "unknown".to_string()
}

/// HTTP client for the ROI store
pub struct HttpRoiStoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRoiStoreClient {
    pub fn new(config: &RoiStoreConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    async fn fetch_once(&self) -> Result<Vec<Roi>, ClientError> {
        let response = self
            .http
            .get(format!("{}/rois", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response
            .json::<RoiResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(parse_rois(body.data))
    }
}

#[async_trait]
impl RoiProvider for HttpRoiStoreClient {
    async fn current_rois(&self) -> Result<Vec<Roi>, ClientError> {
        let mut last_err = None;
        for attempt in 0..=RETRY_ATTEMPTS {
            match self.fetch_once().await {
                Ok(rois) => {
                    debug!(count = rois.len(), "ROI set fetched");
                    return Ok(rois);
                }
                Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                    warn!(attempt, error = %e, "ROI fetch failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(ClientError::Status(500)))
    }
}

/// Normalize ROI DTOs, dropping entries with unusable geometry
fn parse_rois(dtos: Vec<RoiDto>) -> Vec<Roi> {
    let mut rois = Vec::with_capacity(dtos.len());
    for dto in dtos {
        let shape = match (dto.shape.as_str(), dto.coordinates) {
            ("rectangle", CoordinatesDto::Rect {
                x,
                y,
                width,
                height,
            }) => RoiShape::Rectangle {
                bounds: BoundingBox::new(x, y, width, height),
            },
            ("rectangle", CoordinatesDto::Points(points)) => {
                // Rect described by its corner points: take the envelope
                let points: Vec<Point> =
                    points.iter().map(|[x, y]| Point::new(*x, *y)).collect();
                if points.is_empty() {
                    warn!(roi = %dto.name, "skipping rectangle ROI without coordinates");
                    continue;
                }
                RoiShape::Rectangle {
                    bounds: RoiShape::Polygon { points }.envelope(),
                }
            }
            ("polygon", CoordinatesDto::Points(points)) => {
                if points.len() < 3 {
                    warn!(roi = %dto.name, vertices = points.len(), "skipping degenerate polygon ROI");
                    continue;
                }
                RoiShape::Polygon {
                    points: points.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
                }
            }
            ("polygon", CoordinatesDto::Rect {
                x,
                y,
                width,
                height,
            }) => RoiShape::Polygon {
                points: vec![
                    Point::new(x, y),
                    Point::new(x + width, y),
                    Point::new(x + width, y + height),
                    Point::new(x, y + height),
                ],
            },
            (other, _) => {
                warn!(roi = %dto.name, shape = other, "skipping ROI with unknown shape");
                continue;
            }
        };

        rois.push(Roi {
            name: dto.name,
            shape,
            requires_scooper: dto.requires_scooper,
            ingredient_type: dto.ingredient_type,
        });
    }
    rois
}

struct Snapshot {
    fetched_at: Instant,
    rois: Vec<Roi>,
}

/// Stale-tolerant cache around any [`RoiProvider`].
///
/// A failed refresh serves the previous snapshot until it exceeds the
/// configured age, after which the error propagates and the caller skips
/// the frame.
pub struct CachedRoiProvider<P> {
    inner: P,
    snapshot: RwLock<Option<Snapshot>>,
    max_age: Duration,
}

impl<P: RoiProvider> CachedRoiProvider<P> {
    #[must_use]
    pub fn new(inner: P, max_snapshot_age: Duration) -> Self {
        Self {
            inner,
            snapshot: RwLock::new(None),
            max_age: max_snapshot_age,
        }
    }
}

#[async_trait]
impl<P: RoiProvider> RoiProvider for CachedRoiProvider<P> {
    async fn current_rois(&self) -> Result<Vec<Roi>, ClientError> {
        match self.inner.current_rois().await {
            Ok(rois) => {
                *self.snapshot.write().await = Some(Snapshot {
                    fetched_at: Instant::now(),
                    rois: rois.clone(),
                });
                Ok(rois)
            }
            Err(e) => {
                let guard = self.snapshot.read().await;
                if let Some(snapshot) = guard.as_ref() {
                    if snapshot.fetched_at.elapsed() <= self.max_age {
                        warn!(error = %e, "ROI fetch failed, reusing last snapshot");
                        return Ok(snapshot.rois.clone());
                    }
                }
                Err(ClientError::NoSnapshot(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn dto_json(value: serde_json::Value) -> Vec<RoiDto> {
        serde_json::from_value::<RoiResponse>(value).unwrap().data
    }

    #[test]
    fn test_parse_rect_coordinates() {
        let rois = parse_rois(dto_json(serde_json::json!({
            "data": [{
                "name": "sauce_station",
                "shape": "rectangle",
                "coordinates": {"x": 500.0, "y": 400.0, "width": 200.0, "height": 200.0},
                "requires_scooper": true,
                "ingredient_type": "sauce"
            }]
        })));

        assert_eq!(rois.len(), 1);
        assert!(rois[0].contains(Point::new(520.0, 420.0)));
        assert!(rois[0].requires_scooper);
    }

    #[test]
    fn test_parse_rect_from_corner_points() {
        let rois = parse_rois(dto_json(serde_json::json!({
            "data": [{
                "name": "cheese_station",
                "shape": "rectangle",
                "coordinates": [[100.0, 100.0], [300.0, 100.0], [300.0, 250.0], [100.0, 250.0]]
            }]
        })));

        assert_eq!(rois.len(), 1);
        assert!(matches!(rois[0].shape, RoiShape::Rectangle { .. }));
        assert!(rois[0].contains(Point::new(200.0, 200.0)));
        // Defaults applied
        assert!(rois[0].requires_scooper);
        assert_eq!(rois[0].ingredient_type, "unknown");
    }

    #[test]
    fn test_parse_polygon() {
        let rois = parse_rois(dto_json(serde_json::json!({
            "data": [{
                "name": "topping_bin",
                "shape": "polygon",
                "coordinates": [[0.0, 0.0], [100.0, 0.0], [50.0, 100.0]],
                "ingredient_type": "olives"
            }]
        })));

        assert_eq!(rois.len(), 1);
        assert!(rois[0].contains(Point::new(50.0, 40.0)));
    }

    #[test]
    fn test_degenerate_polygon_skipped() {
        let rois = parse_rois(dto_json(serde_json::json!({
            "data": [{
                "name": "broken",
                "shape": "polygon",
                "coordinates": [[0.0, 0.0], [100.0, 0.0]]
            }]
        })));
        assert!(rois.is_empty());
    }

    #[test]
    fn test_unknown_shape_skipped() {
        let rois = parse_rois(dto_json(serde_json::json!({
            "data": [{
                "name": "circle_zone",
                "shape": "circle",
                "coordinates": [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]
            }]
        })));
        assert!(rois.is_empty());
    }

    struct FlakyProvider {
        fail: AtomicBool,
    }

    #[async_trait]
    impl RoiProvider for FlakyProvider {
        async fn current_rois(&self) -> Result<Vec<Roi>, ClientError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(ClientError::Status(503))
            } else {
                Ok(vec![Roi {
                    name: "sauce_station".to_string(),
                    shape: RoiShape::Rectangle {
                        bounds: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                    },
                    requires_scooper: true,
                    ingredient_type: "sauce".to_string(),
                }])
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_serves_stale_snapshot() {
        let provider = CachedRoiProvider::new(
            FlakyProvider {
                fail: AtomicBool::new(false),
            },
            Duration::from_secs(60),
        );

        let fresh = provider.current_rois().await.unwrap();
        assert_eq!(fresh.len(), 1);

        provider.inner.fail.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(30)).await;
        let stale = provider.current_rois().await.unwrap();
        assert_eq!(stale.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_max_age() {
        let provider = CachedRoiProvider::new(
            FlakyProvider {
                fail: AtomicBool::new(false),
            },
            Duration::from_secs(60),
        );

        provider.current_rois().await.unwrap();
        provider.inner.fail.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;

        let result = provider.current_rois().await;
        assert!(matches!(result, Err(ClientError::NoSnapshot(_))));
    }

    #[tokio::test]
    async fn test_cache_without_snapshot_fails() {
        let provider = CachedRoiProvider::new(
            FlakyProvider {
                fail: AtomicBool::new(true),
            },
            Duration::from_secs(60),
        );
        let result = provider.current_rois().await;
        assert!(matches!(result, Err(ClientError::NoSnapshot(_))));
    }
}
