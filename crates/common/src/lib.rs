/// Common types and utilities shared across the violation analysis pipeline
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geometry;

pub use geometry::point_in_polygon;

/// Pipeline-wide errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed detection: {0}")]
    MalformedDetection(String),

    #[error("Invalid ROI geometry for '{name}': {reason}")]
    InvalidRoi { name: String, reason: String },

    #[error("Unknown detection class: {0}")]
    UnknownClass(String),

    #[error("Session '{0}' has been halted")]
    SessionHalted(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Object classes the detector reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionClass {
    Hand,
    Person,
    Pizza,
    Scooper,
}

impl DetectionClass {
    /// Parse a detector class label, tolerating the plural and synonym
    /// spellings seen in the wild. Returns `None` for unknown labels.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "hand" | "hands" => Some(Self::Hand),
            "person" | "people" => Some(Self::Person),
            "pizza" => Some(Self::Pizza),
            "scooper" | "scoopers" | "spoon" | "utensil" => Some(Self::Scooper),
            _ => None,
        }
    }

    /// Get the canonical class label
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hand => "hand",
            Self::Person => "person",
            Self::Pizza => "pizza",
            Self::Scooper => "scooper",
        }
    }
}

/// A point in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[must_use]
    #[inline]
    pub fn distance_to(&self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get center coordinates
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Get area of bounding box
    #[must_use]
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Check if a point lies inside the box (bounds inclusive)
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Calculate Intersection over Union (`IoU`) with another box
    #[must_use]
    #[inline]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection_width = (x2 - x1).max(0.0);
        let intersection_height = (y2 - y1).max(0.0);
        let intersection_area = intersection_width * intersection_height;

        let union_area = self.area() + other.area() - intersection_area;

        if union_area > 0.0 {
            intersection_area / union_area
        } else {
            0.0
        }
    }
}

/// A single object detection within one frame. Lifetime is one frame: the
/// analyzer never holds detections beyond the bounded frame history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub center: Point,
    pub area: f32,
    pub frame_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Detection {
    /// Build a detection from a bounding box, deriving center and area
    #[must_use]
    pub fn from_bbox(
        class: DetectionClass,
        confidence: f32,
        bbox: BoundingBox,
        frame_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            class,
            confidence,
            center: bbox.center(),
            area: bbox.area(),
            bbox,
            frame_id: frame_id.into(),
            timestamp,
        }
    }
}

/// Geometric shape of a region of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum RoiShape {
    Rectangle { bounds: BoundingBox },
    Polygon { points: Vec<Point> },
}

impl RoiShape {
    /// Check whether a point lies inside the region.
    ///
    /// Rectangles use axis-aligned inclusion; polygons use even-odd ray
    /// casting. Degenerate polygons (fewer than 3 vertices) are empty.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        match self {
            Self::Rectangle { bounds } => bounds.contains(p),
            Self::Polygon { points } => point_in_polygon(p, points),
        }
    }

    /// Axis-aligned envelope of the shape, used for overlays and evidence
    #[must_use]
    pub fn envelope(&self) -> BoundingBox {
        match self {
            Self::Rectangle { bounds } => *bounds,
            Self::Polygon { points } => {
                if points.is_empty() {
                    return BoundingBox::default();
                }
                let mut min_x = f32::MAX;
                let mut min_y = f32::MAX;
                let mut max_x = f32::MIN;
                let mut max_y = f32::MIN;
                for p in points {
                    min_x = min_x.min(p.x);
                    min_y = min_y.min(p.y);
                    max_x = max_x.max(p.x);
                    max_y = max_y.max(p.y);
                }
                BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
            }
        }
    }
}

/// A named ingredient region. Immutable for the duration of one analysis
/// cycle; refreshed from the ROI store between frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub name: String,
    #[serde(flatten)]
    pub shape: RoiShape,
    pub requires_scooper: bool,
    pub ingredient_type: String,
}

impl Roi {
    /// "Hand in ROI" is defined by center containment only
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.shape.contains(p)
    }
}

/// Violation severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Description of the video source a frame came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(rename = "type")]
    pub source_type: String,
    pub path: String,
    pub fps: f32,
    pub resolution: (u32, u32),
}
