//! Scooper-usage classification
//!
//! Decides, per hand per frame, whether the hand is actively using a scooper
//! utensil. Two classifiers implement the same contract:
//!
//! - [`SimpleTieredClassifier`] (default): distance tiers only. Cheap,
//!   deterministic, suitable for real-time analysis.
//! - [`RichEvidenceClassifier`]: combines spatial overlap, movement
//!   synchronization and temporal proximity over the recent frame history
//!   for higher precision.
//!
//! With several scoopers in frame, both classifiers evaluate each candidate
//! and keep the highest-confidence verdict; the reported closest distance is
//! the minimum over all scoopers.

pub mod rich;

use scooper_watch_common::Detection;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

pub use rich::RichEvidenceClassifier;

/// Which branch of the usage policy produced the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTier {
    /// Active-use requirement (hand is, or must be, holding the scooper)
    Tier1Strict,
    /// Nearby-scooper fallback accepted as a proxy for use
    Tier2Fallback,
    /// No scooper anywhere near the hand
    NoScooperDetected,
}

impl DecisionTier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tier1Strict => "tier1_strict",
            Self::Tier2Fallback => "tier2_fallback",
            Self::NoScooperDetected => "no_scooper_detected",
        }
    }
}

/// Classifier verdict for one hand in one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageAssessment {
    pub using_scooper: bool,
    /// Confidence in the verdict, 0.0 to 1.0
    pub confidence: f32,
    /// Minimum center-to-center distance over all scoopers in frame,
    /// `None` when the frame contains no scoopers
    pub closest_distance: Option<f32>,
    pub tier: DecisionTier,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Tier-1 threshold: a scooper within this distance counts as in use
    pub active_max_px: f32,
    /// Tier-2 threshold: a scooper within this distance may count as in use
    /// when the nearby fallback is enabled
    pub nearby_max_px: f32,
    /// Accept a nearby (not held) scooper as compliant
    pub allow_nearby_fallback: bool,
    /// Rich mode: reject candidates farther than this outright
    pub proximity_gate_px: f32,
    /// Rich mode: combined score needed to call active use
    pub decision_threshold: f32,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            active_max_px: 50.0,
            nearby_max_px: 100.0,
            allow_nearby_fallback: true,
            proximity_gate_px: 40.0,
            decision_threshold: 0.6,
        }
    }
}

/// Common contract for both classification modes
pub trait UsageClassifier: Send + Sync {
    /// Assess one hand against every scooper visible in the frame
    fn assess(
        &self,
        hand: &Detection,
        scoopers: &[Detection],
        history: &FrameHistory,
    ) -> UsageAssessment;
}

/// Minimum center distance from the hand to any scooper
#[must_use]
pub fn closest_scooper_distance(hand: &Detection, scoopers: &[Detection]) -> Option<f32> {
    scoopers
        .iter()
        .map(|s| hand.center.distance_to(s.center))
        .min_by(|a, b| a.total_cmp(b))
}

/// Distance-tier classifier (default mode)
pub struct SimpleTieredClassifier {
    config: UsageConfig,
}

impl SimpleTieredClassifier {
    #[must_use]
    pub fn new(config: UsageConfig) -> Self {
        Self { config }
    }
}

impl UsageClassifier for SimpleTieredClassifier {
    fn assess(
        &self,
        hand: &Detection,
        scoopers: &[Detection],
        _history: &FrameHistory,
    ) -> UsageAssessment {
        let Some(closest) = closest_scooper_distance(hand, scoopers) else {
            return UsageAssessment {
                using_scooper: false,
                confidence: 1.0,
                closest_distance: None,
                tier: DecisionTier::NoScooperDetected,
            };
        };

        let (using, tier) = if closest <= self.config.active_max_px {
            (true, DecisionTier::Tier1Strict)
        } else if closest <= self.config.nearby_max_px {
            if self.config.allow_nearby_fallback {
                (true, DecisionTier::Tier2Fallback)
            } else {
                (false, DecisionTier::Tier1Strict)
            }
        } else {
            (false, DecisionTier::NoScooperDetected)
        };

        debug!(closest, using, tier = tier.as_str(), "tiered assessment");
        UsageAssessment {
            using_scooper: using,
            confidence: 1.0,
            closest_distance: Some(closest),
            tier,
        }
    }
}

/// One analyzed frame's detections, retained for temporal reasoning
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame_id: String,
    pub detections: Vec<Detection>,
}

/// Bounded buffer of recent analyzed frames (JPEG bytes are never kept)
pub struct FrameHistory {
    frames: VecDeque<FrameSnapshot>,
    capacity: usize,
}

impl FrameHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    /// Record a frame's detections, evicting the oldest beyond capacity
    pub fn push(&mut self, frame_id: impl Into<String>, detections: Vec<Detection>) {
        self.frames.push_back(FrameSnapshot {
            frame_id: frame_id.into(),
            detections,
        });
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    /// The most recent `n` frames, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&FrameSnapshot> {
        let skip = self.frames.len().saturating_sub(n);
        self.frames.iter().skip(skip).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new(100)
    }
}
