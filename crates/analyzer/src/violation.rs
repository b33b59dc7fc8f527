//! Violation events and evidence

use chrono::{DateTime, Utc};
use scooper_watch_common::{BoundingBox, Point, Severity};
use scooper_watch_scooper_usage::DecisionTier;
use scooper_watch_sequence_tracking::{ActionType, HandIdentity};
use serde::{Deserialize, Serialize};

/// Kind of hygiene violation detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Bare hand in an ingredient region with no scooper in play
    HandWithoutScooper,
    /// A scooper was close by but not actively used (strict mode)
    ScooperNearbyButNotUsed,
}

impl ViolationType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandWithoutScooper => "hand_without_scooper",
            Self::ScooperNearbyButNotUsed => "scooper_nearby_but_not_used",
        }
    }
}

/// Supporting evidence recorded with every violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvidence {
    pub hand_bbox: BoundingBox,
    pub hand_center: Point,
    /// Axis-aligned envelope of the region
    pub roi_bounds: BoundingBox,
    pub ingredient_type: String,
    /// Minimum distance to any scooper in the entry frame, `None` when no
    /// scooper was visible
    pub closest_scooper_distance: Option<f32>,
    /// Which branch of the usage policy fired
    pub decision_tier: DecisionTier,
    /// Classified worker action at violation time, when a worker was labeled
    pub movement_pattern: Option<ActionType>,
}

/// One violation, bound to exactly one work session (entry-to-exit
/// sequence). Stamped with the entry frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub violation_id: String,
    pub session_id: String,
    /// Sequence this violation covers
    pub sequence_id: String,
    /// String form of the (hand identity, region) key
    pub sequence_key: String,
    /// Entry frame of the sequence
    pub frame_id: String,
    pub frame_number: u64,
    pub roi_name: String,
    pub hand: HandIdentity,
    pub worker_id: Option<u32>,
    pub violation_type: ViolationType,
    pub severity: Severity,
    /// Detection confidence of the offending hand
    pub confidence: f32,
    pub description: String,
    pub evidence: ViolationEvidence,
    pub created_at: DateTime<Utc>,
}

impl ViolationEvent {
    /// Label drawn next to the hand box on annotated frames
    #[must_use]
    pub fn overlay_label(&self) -> String {
        format!("{} ({:.2})", self.violation_type.as_str(), self.confidence)
    }

    /// Payload published to the message bus
    #[must_use]
    pub fn publish_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "violation_id": self.violation_id,
            "session_id": self.session_id,
            "frame_id": self.frame_id,
            "timestamp": self.created_at,
            "violation_type": self.violation_type.as_str(),
            "severity": self.severity.as_str(),
            "worker_id": self.worker_id,
            "roi_zone": self.roi_name,
            "confidence": self.confidence,
            "hand_position": self.evidence.hand_center,
            "scooper_present": self.evidence.closest_scooper_distance.is_some(),
            "sequence_key": self.sequence_key,
            "decision_tier": self.evidence.decision_tier.as_str(),
        })
    }
}
