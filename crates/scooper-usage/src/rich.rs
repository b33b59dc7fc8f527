//! Rich-evidence usage classifier
//!
//! Scores each hand/scooper pairing on three axes and combines them into an
//! active-use decision:
//!
//! - spatial: bbox overlap, directional alignment, size plausibility
//! - movement: whether hand and scooper moved together across recent frames
//! - temporal: whether the pairing stayed close over recent frames
//!
//! Objects are re-identified across frames by nearest-match on center
//! position within the same class; there is no persistent tracker.

use crate::{
    closest_scooper_distance, DecisionTier, FrameHistory, FrameSnapshot, UsageAssessment,
    UsageClassifier, UsageConfig,
};
use scooper_watch_common::{Detection, DetectionClass, Point};
use tracing::debug;

/// Frames consulted for movement synchronization
const MOVEMENT_WINDOW: usize = 5;
/// Frames consulted for temporal consistency
const TEMPORAL_WINDOW: usize = 10;
/// Maximum center displacement for cross-frame re-identification
const REIDENTIFY_MAX_PX: f32 = 100.0;
/// Distance at which proximity scores decay to zero
const PROXIMITY_FALLOFF_PX: f32 = 60.0;

/// Multi-signal classifier for higher-precision usage decisions
pub struct RichEvidenceClassifier {
    config: UsageConfig,
}

impl RichEvidenceClassifier {
    #[must_use]
    pub fn new(config: UsageConfig) -> Self {
        Self { config }
    }

    fn combined_score(
        &self,
        hand: &Detection,
        scooper: &Detection,
        history: &FrameHistory,
    ) -> f32 {
        let spatial = spatial_score(hand, scooper);
        let movement = movement_sync_score(hand, scooper, history);
        let temporal = temporal_consistency_score(hand, scooper, history);
        let combined = spatial * 0.4 + movement * 0.4 + temporal * 0.2;
        debug!(spatial, movement, temporal, combined, "rich evidence scores");
        combined
    }
}

impl UsageClassifier for RichEvidenceClassifier {
    fn assess(
        &self,
        hand: &Detection,
        scoopers: &[Detection],
        history: &FrameHistory,
    ) -> UsageAssessment {
        let Some(closest) = closest_scooper_distance(hand, scoopers) else {
            return UsageAssessment {
                using_scooper: false,
                confidence: 1.0,
                closest_distance: None,
                tier: DecisionTier::NoScooperDetected,
            };
        };

        // Evaluate every scooper within the proximity gate, keep the best
        let mut best_score = 0.0_f32;
        for scooper in scoopers {
            if hand.center.distance_to(scooper.center) > self.config.proximity_gate_px {
                continue;
            }
            best_score = best_score.max(self.combined_score(hand, scooper, history));
        }

        if best_score >= self.config.decision_threshold {
            return UsageAssessment {
                using_scooper: true,
                confidence: best_score.min(1.0),
                closest_distance: Some(closest),
                tier: DecisionTier::Tier1Strict,
            };
        }

        if closest <= self.config.nearby_max_px {
            if self.config.allow_nearby_fallback {
                return UsageAssessment {
                    using_scooper: true,
                    confidence: 0.5,
                    closest_distance: Some(closest),
                    tier: DecisionTier::Tier2Fallback,
                };
            }
            // Nearby but not actively held: strict mode flags this
            return UsageAssessment {
                using_scooper: false,
                confidence: (1.0 - best_score).clamp(0.0, 1.0),
                closest_distance: Some(closest),
                tier: DecisionTier::Tier1Strict,
            };
        }

        UsageAssessment {
            using_scooper: false,
            confidence: (1.0 - best_score).clamp(0.0, 1.0),
            closest_distance: Some(closest),
            tier: DecisionTier::NoScooperDetected,
        }
    }
}

/// Spatial plausibility of "hand is holding this scooper": bbox overlap,
/// the scooper lying along an extension of the hand, and a sane size ratio.
#[must_use]
pub fn spatial_score(hand: &Detection, scooper: &Detection) -> f32 {
    let overlap = hand.bbox.iou(&scooper.bbox);
    let position = directional_alignment_score(hand.center, scooper.center);
    let size = size_ratio_score(hand.area, scooper.area);

    (overlap * 0.5 + position * 0.3 + size * 0.2).clamp(0.0, 1.0)
}

/// Reward scoopers positioned along a cardinal-ish extension of the hand,
/// with a bonus for small separation.
fn directional_alignment_score(hand: Point, scooper: Point) -> f32 {
    let dx = scooper.x - hand.x;
    let dy = scooper.y - hand.y;
    let distance = (dx * dx + dy * dy).sqrt();

    if distance == 0.0 {
        return 1.0;
    }

    let angle = dy.atan2(dx).abs();
    let angle_score = 1.0 - angle.min(std::f32::consts::PI - angle) / std::f32::consts::FRAC_PI_2;
    let distance_score = (1.0 - distance / PROXIMITY_FALLOFF_PX).max(0.0);

    angle_score * 0.6 + distance_score * 0.4
}

/// Plausible scooper-to-hand area ratios
fn size_ratio_score(hand_area: f32, scooper_area: f32) -> f32 {
    if hand_area <= 0.0 || scooper_area <= 0.0 {
        return 0.0;
    }
    let ratio = scooper_area / hand_area;
    if (0.2..=0.8).contains(&ratio) {
        1.0
    } else if (0.1..=1.2).contains(&ratio) {
        0.7
    } else if (0.05..=2.0).contains(&ratio) {
        0.4
    } else {
        0.0
    }
}

/// Nearest detection of the given class within the re-identification radius
fn reidentify<'a>(
    target: &Detection,
    snapshot: &'a FrameSnapshot,
    class: DetectionClass,
) -> Option<&'a Detection> {
    snapshot
        .detections
        .iter()
        .filter(|d| d.class == class)
        .map(|d| (target.center.distance_to(d.center), d))
        .filter(|(distance, _)| *distance < REIDENTIFY_MAX_PX)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, d)| d)
}

/// Synchronization of hand and scooper motion across the recent frames.
///
/// Returns 0.5 when there is not enough matched history to judge.
#[must_use]
pub fn movement_sync_score(
    hand: &Detection,
    scooper: &Detection,
    history: &FrameHistory,
) -> f32 {
    if history.len() < 3 {
        return 0.5;
    }

    let mut hand_track: Vec<Point> = Vec::with_capacity(MOVEMENT_WINDOW);
    let mut scooper_track: Vec<Point> = Vec::with_capacity(MOVEMENT_WINDOW);

    for snapshot in history.recent(MOVEMENT_WINDOW) {
        let frame_hand = reidentify(hand, snapshot, DetectionClass::Hand);
        let frame_scooper = reidentify(scooper, snapshot, DetectionClass::Scooper);
        if let (Some(h), Some(s)) = (frame_hand, frame_scooper) {
            hand_track.push(h.center);
            scooper_track.push(s.center);
        }
    }

    if hand_track.len() < 2 {
        return 0.5;
    }

    let mut sync_scores = Vec::with_capacity(hand_track.len() - 1);
    for i in 1..hand_track.len() {
        let hand_vec = (
            hand_track[i].x - hand_track[i - 1].x,
            hand_track[i].y - hand_track[i - 1].y,
        );
        let scooper_vec = (
            scooper_track[i].x - scooper_track[i - 1].x,
            scooper_track[i].y - scooper_track[i - 1].y,
        );

        let hand_mag = (hand_vec.0 * hand_vec.0 + hand_vec.1 * hand_vec.1).sqrt();
        let scooper_mag = (scooper_vec.0 * scooper_vec.0 + scooper_vec.1 * scooper_vec.1).sqrt();

        let score = if hand_mag == 0.0 && scooper_mag == 0.0 {
            // Both stationary counts as synchronized
            1.0
        } else if hand_mag == 0.0 || scooper_mag == 0.0 {
            0.0
        } else {
            let dot = hand_vec.0 * scooper_vec.0 + hand_vec.1 * scooper_vec.1;
            let cosine = dot / (hand_mag * scooper_mag);
            let direction_score = (cosine + 1.0) / 2.0;
            let magnitude_ratio = hand_mag.min(scooper_mag) / hand_mag.max(scooper_mag);
            direction_score * 0.7 + magnitude_ratio * 0.3
        };
        sync_scores.push(score);
    }

    sync_scores.iter().sum::<f32>() / sync_scores.len() as f32
}

/// Consistency of hand/scooper proximity across the recent frames.
///
/// Returns 0.5 when the history is too short to judge, 0.0 when the pairing
/// was never re-identified together.
#[must_use]
pub fn temporal_consistency_score(
    hand: &Detection,
    scooper: &Detection,
    history: &FrameHistory,
) -> f32 {
    if history.len() < 3 {
        return 0.5;
    }

    let mut proximity_scores = Vec::with_capacity(TEMPORAL_WINDOW);
    for snapshot in history.recent(TEMPORAL_WINDOW) {
        let frame_hand = reidentify(hand, snapshot, DetectionClass::Hand);
        let frame_scooper = reidentify(scooper, snapshot, DetectionClass::Scooper);
        if let (Some(h), Some(s)) = (frame_hand, frame_scooper) {
            let distance = h.center.distance_to(s.center);
            proximity_scores.push((1.0 - distance / PROXIMITY_FALLOFF_PX).max(0.0));
        }
    }

    if proximity_scores.is_empty() {
        return 0.0;
    }

    let mean = proximity_scores.iter().sum::<f32>() / proximity_scores.len() as f32;
    let variance = proximity_scores
        .iter()
        .map(|s| (s - mean) * (s - mean))
        .sum::<f32>()
        / proximity_scores.len() as f32;
    let stability = (1.0 - variance).max(0.0);

    mean * 0.7 + stability * 0.3
}
