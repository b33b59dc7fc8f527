//! Per-frame analysis engine
//!
//! Owns all mutable state for one capture session: the sequence tracker,
//! the arbiter registries, the classifier's frame history and the worker
//! trackers. Purely in-memory and non-blocking; all I/O lives in the
//! session worker around it.
//!
//! Temporal reasoning (cooldowns, staleness, sequence times) is driven by
//! the timestamps carried on the frames themselves, which keeps replayed
//! footage deterministic.

use crate::arbiter::{ArbiterConfig, EntryDecision, ViolationArbiter};
use crate::config::AnalyzerConfig;
use crate::violation::{ViolationEvent, ViolationEvidence, ViolationType};
use chrono::{DateTime, Utc};
use scooper_watch_common::{Detection, DetectionClass, Roi, Severity};
use scooper_watch_scooper_usage::{
    DecisionTier, FrameHistory, RichEvidenceClassifier, SimpleTieredClassifier, UsageAssessment,
    UsageClassifier,
};
use scooper_watch_sequence_tracking::{
    associate_hands_with_workers, HandIdentity, SequenceKey, SequenceTracker, WorkerRegistry,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One frame's worth of input to the engine
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub frame_id: String,
    pub frame_number: u64,
    pub timestamp: DateTime<Utc>,
    pub detections: Vec<Detection>,
    pub rois: Vec<Roi>,
}

/// Counts reported back with every analyzed frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameSummary {
    pub total_detections: usize,
    pub hands_detected: usize,
    pub persons_detected: usize,
    pub scoopers_detected: usize,
    pub violations_found: usize,
}

/// Result of analyzing one frame
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub violations: Vec<ViolationEvent>,
    pub summary: FrameSummary,
}

/// Rolling per-session counters exposed over the stats endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_analyzed: u64,
    pub violations_total: u64,
    pub hands_seen: u64,
    pub persons_seen: u64,
    pub scoopers_seen: u64,
    pub active_sequences: usize,
    pub completed_sequences: usize,
    pub cooldown_entries: usize,
    pub active_workers: usize,
    pub last_frame_id: Option<String>,
    pub halted: bool,
}

/// Stateful analyzer for one session
pub struct SessionAnalyzer {
    session_id: String,
    config: AnalyzerConfig,
    tracker: SequenceTracker,
    arbiter: ViolationArbiter,
    classifier: Box<dyn UsageClassifier>,
    history: FrameHistory,
    workers: WorkerRegistry,
    stats: SessionStats,
    last_frame_time: Option<DateTime<Utc>>,
}

impl SessionAnalyzer {
    #[must_use]
    pub fn new(session_id: impl Into<String>, config: AnalyzerConfig) -> Self {
        let classifier: Box<dyn UsageClassifier> = if config.rich_mode_enabled {
            Box::new(RichEvidenceClassifier::new(config.usage_config()))
        } else {
            Box::new(SimpleTieredClassifier::new(config.usage_config()))
        };

        let arbiter = ViolationArbiter::new(ArbiterConfig {
            work_session_cooldown_secs: config.work_session_cooldown_secs,
            cooldown_retention_secs: config.cooldown_retention_secs,
        });

        Self {
            session_id: session_id.into(),
            tracker: SequenceTracker::new(config.tracker_config()),
            arbiter,
            classifier,
            history: FrameHistory::new(config.frame_history),
            workers: WorkerRegistry::new(),
            stats: SessionStats::default(),
            config,
            last_frame_time: None,
        }
    }

    /// Analyze one frame, returning any violations stamped at this frame
    pub fn analyze(&mut self, frame: &FrameInput) -> FrameOutcome {
        let now = frame.timestamp;
        self.last_frame_time = Some(now);

        let hands: Vec<Detection> = class_of(&frame.detections, DetectionClass::Hand);
        let persons: Vec<Detection> = class_of(&frame.detections, DetectionClass::Person);
        let scoopers: Vec<Detection> = class_of(&frame.detections, DetectionClass::Scooper);

        debug!(
            frame_id = %frame.frame_id,
            hands = hands.len(),
            persons = persons.len(),
            scoopers = scoopers.len(),
            "analyzing frame"
        );

        let associations =
            associate_hands_with_workers(&hands, &persons, self.config.hand_worker_assoc_max_px);
        self.update_workers(&hands, &persons, &scoopers, &associations, now);

        let mut violations = Vec::new();
        for (hand_idx, hand) in hands.iter().enumerate() {
            let identity = HandIdentity::new(hand_idx, associations[hand_idx]);
            let assessment = self.classifier.assess(hand, &scoopers, &self.history);

            for roi in &frame.rois {
                let key = SequenceKey::new(identity.clone(), &roi.name);
                if roi.contains(hand.center) {
                    let event = self.tracker.observe_inside(
                        key.clone(),
                        &frame.frame_id,
                        now,
                        hand.center,
                        assessment.using_scooper,
                        assessment.closest_distance,
                    );

                    if event.is_entry() && roi.requires_scooper {
                        if let Some(violation) =
                            self.arbitrate_entry(&key, hand, roi, &assessment, frame)
                        {
                            violations.push(violation);
                        }
                    }
                } else if self.tracker.has_active(&key) {
                    // Hand observed outside the region: the work session ends
                    if let Some(sequence) =
                        self.tracker.observe_outside(&key, &frame.frame_id, now)
                    {
                        self.arbiter.on_sequence_closed(&key);
                        info!(
                            key = %key,
                            duration_secs = sequence.duration().num_seconds(),
                            usage_percent = sequence.scooper_usage_percent(),
                            used_properly =
                                sequence.used_properly(self.config.scooper_usage_required_percent),
                            "work session completed"
                        );
                    }
                }
            }
        }

        // The history feeds the classifier's temporal reasoning, so the
        // current frame is appended only after all hands were assessed
        self.history
            .push(frame.frame_id.clone(), frame.detections.clone());

        self.run_janitors(now);
        self.update_stats(frame, &hands, &persons, &scoopers, violations.len());

        let summary = FrameSummary {
            total_detections: frame.detections.len(),
            hands_detected: hands.len(),
            persons_detected: persons.len(),
            scoopers_detected: scoopers.len(),
            violations_found: violations.len(),
        };

        FrameOutcome {
            violations,
            summary,
        }
    }

    fn arbitrate_entry(
        &mut self,
        key: &SequenceKey,
        hand: &Detection,
        roi: &Roi,
        assessment: &UsageAssessment,
        frame: &FrameInput,
    ) -> Option<ViolationEvent> {
        let violation_id = format!("violation_{}", Uuid::new_v4());
        let decision =
            self.arbiter
                .evaluate_entry(key, assessment.using_scooper, &violation_id, frame.timestamp);

        match decision {
            EntryDecision::Violate => {
                let sequence_id = self
                    .tracker
                    .active_sequence(key)
                    .map(|s| s.sequence_id.clone())
                    .unwrap_or_default();
                Some(self.build_violation(violation_id, sequence_id, key, hand, roi, assessment, frame))
            }
            EntryDecision::Compliant => {
                debug!(key = %key, "entry compliant, sequence will not be re-evaluated");
                None
            }
            EntryDecision::CooldownActive => None,
            EntryDecision::AlreadyFlagged => {
                // A fresh entry cannot carry a live marker; this indicates a
                // lifecycle bug rather than an expected suppression
                warn!(key = %key, "entry found an existing violation marker");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_violation(
        &self,
        violation_id: String,
        sequence_id: String,
        key: &SequenceKey,
        hand: &Detection,
        roi: &Roi,
        assessment: &UsageAssessment,
        frame: &FrameInput,
    ) -> ViolationEvent {
        // Severity follows the decision tier: a nearby-but-unused scooper
        // (rich/strict mode) is a medium finding, a bare hand is high
        let nearby_not_used = self.config.rich_mode_enabled
            && assessment.tier == DecisionTier::Tier1Strict
            && assessment
                .closest_distance
                .is_some_and(|d| d <= self.config.scooper_nearby_max_px);

        let (violation_type, severity) = if nearby_not_used {
            (ViolationType::ScooperNearbyButNotUsed, Severity::Medium)
        } else {
            (ViolationType::HandWithoutScooper, Severity::High)
        };

        let movement_pattern = key.hand.worker_id.and_then(|w| self.workers.action_for(w));
        let subject = match key.hand.worker_id {
            Some(worker) => format!("Worker {worker}"),
            None => "Unassigned hand".to_string(),
        };
        let description = match violation_type {
            ViolationType::HandWithoutScooper => format!(
                "{subject} in {} without scooper (complete work session)",
                roi.name
            ),
            ViolationType::ScooperNearbyButNotUsed => format!(
                "{subject} in {} with scooper nearby but not in use",
                roi.name
            ),
        };

        info!(
            key = %key,
            violation_id = %violation_id,
            severity = severity.as_str(),
            "work session violation"
        );

        ViolationEvent {
            violation_id,
            session_id: self.session_id.clone(),
            sequence_id,
            sequence_key: key.to_string(),
            frame_id: frame.frame_id.clone(),
            frame_number: frame.frame_number,
            roi_name: roi.name.clone(),
            hand: key.hand.clone(),
            worker_id: key.hand.worker_id,
            violation_type,
            severity,
            confidence: hand.confidence,
            description,
            evidence: ViolationEvidence {
                hand_bbox: hand.bbox,
                hand_center: hand.center,
                roi_bounds: roi.shape.envelope(),
                ingredient_type: roi.ingredient_type.clone(),
                closest_scooper_distance: assessment.closest_distance,
                decision_tier: assessment.tier,
                movement_pattern,
            },
            created_at: frame.timestamp,
        }
    }

    fn update_workers(
        &mut self,
        hands: &[Detection],
        persons: &[Detection],
        scoopers: &[Detection],
        associations: &[Option<u32>],
        now: DateTime<Utc>,
    ) {
        for (person_idx, person) in persons.iter().enumerate() {
            let worker_id = person_idx as u32 + 1;
            let mut attributed = vec![person.clone()];
            for (hand_idx, assoc) in associations.iter().enumerate() {
                if *assoc == Some(worker_id) {
                    attributed.push(hands[hand_idx].clone());
                }
            }
            // Nearby scoopers provide context for the action classifier
            for scooper in scoopers {
                if scooper.center.distance_to(person.center) < 200.0 {
                    attributed.push(scooper.clone());
                }
            }
            self.workers.update_worker(worker_id, &attributed, now);
        }
    }

    fn run_janitors(&mut self, now: DateTime<Utc>) {
        let stale = self.tracker.force_close_stale(now);
        for key in &stale {
            self.arbiter.on_sequence_closed(key);
        }
        self.arbiter.prune(now);
        self.workers.prune(now);
    }

    fn update_stats(
        &mut self,
        frame: &FrameInput,
        hands: &[Detection],
        persons: &[Detection],
        scoopers: &[Detection],
        violations: usize,
    ) {
        self.stats.frames_analyzed += 1;
        self.stats.violations_total += violations as u64;
        self.stats.hands_seen += hands.len() as u64;
        self.stats.persons_seen += persons.len() as u64;
        self.stats.scoopers_seen += scoopers.len() as u64;
        self.stats.active_sequences = self.tracker.active_count();
        self.stats.completed_sequences = self.tracker.completed_count();
        self.stats.cooldown_entries = self.arbiter.cooldown_entries();
        self.stats.active_workers = self.workers.len();
        self.stats.last_frame_id = Some(frame.frame_id.clone());
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Mark the session halted in its stats
    pub fn mark_halted(&mut self) {
        self.stats.halted = true;
    }

    /// Cancel the session: force-close every active sequence (no violations
    /// are emitted from cancellation) and drop cooldown state.
    pub fn cancel(&mut self) {
        let now = self.last_frame_time.unwrap_or_else(Utc::now);
        let closed = self.tracker.close_all(now);
        if !closed.is_empty() {
            info!(
                session = %self.session_id,
                sequences = closed.len(),
                "cancelled session, force-closed active sequences"
            );
        }
        self.arbiter.clear();
        self.stats.active_sequences = 0;
        self.stats.completed_sequences = self.tracker.completed_count();
        self.stats.cooldown_entries = 0;
    }
}

fn class_of(detections: &[Detection], class: DetectionClass) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.class == class)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scooper_watch_common::{BoundingBox, Point, RoiShape};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn detection(class: DetectionClass, cx: f32, cy: f32, frame_id: &str, t: DateTime<Utc>) -> Detection {
        Detection::from_bbox(
            class,
            0.9,
            BoundingBox::new(cx - 30.0, cy - 30.0, 60.0, 60.0),
            frame_id,
            t,
        )
    }

    fn sauce_roi() -> Roi {
        Roi {
            name: "sauce_station".to_string(),
            shape: RoiShape::Rectangle {
                bounds: BoundingBox::new(500.0, 400.0, 200.0, 200.0),
            },
            requires_scooper: true,
            ingredient_type: "sauce".to_string(),
        }
    }

    fn frame(n: u64, t: DateTime<Utc>, detections: Vec<Detection>) -> FrameInput {
        FrameInput {
            frame_id: format!("frame_{n}"),
            frame_number: n,
            timestamp: t,
            detections,
            rois: vec![sauce_roi()],
        }
    }

    fn analyzer() -> SessionAnalyzer {
        SessionAnalyzer::new("session_test", AnalyzerConfig::default())
    }

    #[test]
    fn test_single_hand_no_scooper_one_violation() {
        let mut analyzer = analyzer();
        let mut total = Vec::new();

        for n in 1..=10 {
            let t = ts(n as i64);
            let hand = detection(DetectionClass::Hand, 520.0, 420.0, &format!("frame_{n}"), t);
            let outcome = analyzer.analyze(&frame(n, t, vec![hand]));
            total.extend(outcome.violations);
        }

        assert_eq!(total.len(), 1);
        let violation = &total[0];
        assert_eq!(violation.frame_id, "frame_1");
        assert_eq!(violation.severity, Severity::High);
        assert_eq!(violation.violation_type, ViolationType::HandWithoutScooper);
        assert_eq!(violation.evidence.closest_scooper_distance, None);
        assert_eq!(
            violation.evidence.decision_tier,
            DecisionTier::NoScooperDetected
        );
    }

    #[test]
    fn test_scooper_held_no_violation() {
        let mut analyzer = analyzer();
        let mut total = Vec::new();

        for n in 1..=10 {
            let t = ts(n as i64);
            let fid = format!("frame_{n}");
            let outcome = analyzer.analyze(&frame(
                n,
                t,
                vec![
                    detection(DetectionClass::Hand, 520.0, 420.0, &fid, t),
                    detection(DetectionClass::Scooper, 530.0, 430.0, &fid, t),
                ],
            ));
            total.extend(outcome.violations);
        }

        assert!(total.is_empty());
    }

    #[test]
    fn test_nearby_scooper_strict_mode_violates() {
        let config = AnalyzerConfig {
            allow_nearby_scooper_fallback: false,
            ..Default::default()
        };
        let mut analyzer = SessionAnalyzer::new("session_test", config);

        let t = ts(1);
        let outcome = analyzer.analyze(&frame(
            1,
            t,
            vec![
                detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t),
                detection(DetectionClass::Scooper, 560.0, 460.0, "frame_1", t),
            ],
        ));

        assert_eq!(outcome.violations.len(), 1);
        let d = outcome.violations[0]
            .evidence
            .closest_scooper_distance
            .unwrap();
        assert!((d - 56.57).abs() < 0.1);
    }

    #[test]
    fn test_nearby_scooper_fallback_accepts() {
        let mut analyzer = analyzer();
        let t = ts(1);
        let outcome = analyzer.analyze(&frame(
            1,
            t,
            vec![
                detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t),
                detection(DetectionClass::Scooper, 560.0, 460.0, "frame_1", t),
            ],
        ));
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn test_reentry_within_cooldown_suppressed() {
        let mut analyzer = analyzer();
        let mut total = Vec::new();

        // Enter at t=0, stay briefly
        let t0 = ts(0);
        total.extend(
            analyzer
                .analyze(&frame(1, t0, vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t0)]))
                .violations,
        );

        // Exit at t=1 (hand observed outside the region)
        let t1 = ts(1);
        total.extend(
            analyzer
                .analyze(&frame(20, t1, vec![detection(DetectionClass::Hand, 100.0, 100.0, "frame_20", t1)]))
                .violations,
        );

        // Re-enter at t=2: same work session, still cooling down
        let t2 = ts(2);
        total.extend(
            analyzer
                .analyze(&frame(25, t2, vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_25", t2)]))
                .violations,
        );

        assert_eq!(total.len(), 1);
        assert_eq!(total[0].frame_id, "frame_1");
    }

    #[test]
    fn test_reentry_after_cooldown_violates_again() {
        let mut analyzer = analyzer();
        let mut total = Vec::new();

        let t0 = ts(0);
        total.extend(
            analyzer
                .analyze(&frame(1, t0, vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t0)]))
                .violations,
        );
        let t1 = ts(1);
        analyzer.analyze(&frame(2, t1, vec![detection(DetectionClass::Hand, 100.0, 100.0, "frame_2", t1)]));

        let t2 = ts(31);
        total.extend(
            analyzer
                .analyze(&frame(3, t2, vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_3", t2)]))
                .violations,
        );

        assert_eq!(total.len(), 2);
    }

    #[test]
    fn test_two_hands_two_violations() {
        let mut analyzer = analyzer();
        let t = ts(1);
        let outcome = analyzer.analyze(&frame(
            1,
            t,
            vec![
                detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t),
                detection(DetectionClass::Hand, 600.0, 500.0, "frame_1", t),
            ],
        ));

        assert_eq!(outcome.violations.len(), 2);
        assert!(outcome
            .violations
            .iter()
            .all(|v| v.frame_id == "frame_1"));
        let keys: Vec<&str> = outcome
            .violations
            .iter()
            .map(|v| v.sequence_key.as_str())
            .collect();
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn test_brief_crossing_single_violation_and_close() {
        let mut analyzer = analyzer();
        let mut total = Vec::new();

        for n in 5..=6 {
            let t = ts(n as i64);
            let fid = format!("frame_{n}");
            total.extend(
                analyzer
                    .analyze(&frame(n, t, vec![detection(DetectionClass::Hand, 520.0, 420.0, &fid, t)]))
                    .violations,
            );
        }
        // Frame 7: hand moved out of the region
        let t7 = ts(7);
        total.extend(
            analyzer
                .analyze(&frame(7, t7, vec![detection(DetectionClass::Hand, 100.0, 100.0, "frame_7", t7)]))
                .violations,
        );

        assert_eq!(total.len(), 1);
        assert_eq!(total[0].frame_id, "frame_5");
        assert_eq!(analyzer.stats().active_sequences, 0);
        assert_eq!(analyzer.stats().completed_sequences, 1);
    }

    #[test]
    fn test_resubmitted_frame_is_idempotent() {
        let mut analyzer = analyzer();
        let t = ts(1);
        let input = frame(
            1,
            t,
            vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t)],
        );

        let first = analyzer.analyze(&input);
        let second = analyzer.analyze(&input);

        assert_eq!(first.violations.len(), 1);
        assert!(second.violations.is_empty());
        assert_eq!(analyzer.stats().active_sequences, 1);
    }

    #[test]
    fn test_violations_in_entry_frame_order() {
        let mut analyzer = analyzer();
        let mut numbers = Vec::new();

        for n in [1_u64, 2, 3] {
            // Distinct hands per frame so each entry violates independently
            let t = ts(n as i64 * 40);
            let mut detections = Vec::new();
            for i in 0..=n as usize {
                detections.push(detection(
                    DetectionClass::Hand,
                    520.0 + i as f32 * 10.0,
                    420.0,
                    &format!("frame_{n}"),
                    t,
                ));
            }
            let outcome = analyzer.analyze(&frame(n, t, detections));
            numbers.extend(outcome.violations.iter().map(|v| v.frame_number));
        }

        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        assert_eq!(numbers, sorted);
    }

    #[test]
    fn test_bounded_active_sequences() {
        let mut analyzer = analyzer();
        let t = ts(1);
        let hands: Vec<Detection> = (0..4)
            .map(|i| detection(DetectionClass::Hand, 520.0 + i as f32 * 20.0, 420.0, "frame_1", t))
            .collect();
        let rois_in_frame = 1;

        analyzer.analyze(&frame(1, t, hands.clone()));
        assert!(analyzer.stats().active_sequences <= hands.len() * rois_in_frame);
    }

    #[test]
    fn test_stale_sequence_closes_without_violation() {
        let mut analyzer = analyzer();
        let t0 = ts(0);
        let first = analyzer.analyze(&frame(
            1,
            t0,
            vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t0)],
        ));
        assert_eq!(first.violations.len(), 1);

        // Hand disappears; 31 s later an empty frame triggers the janitor
        let t1 = ts(31);
        let second = analyzer.analyze(&frame(2, t1, vec![]));
        assert!(second.violations.is_empty());
        assert_eq!(analyzer.stats().active_sequences, 0);
        assert_eq!(analyzer.stats().completed_sequences, 1);
    }

    #[test]
    fn test_roi_not_requiring_scooper_never_violates() {
        let mut analyzer = analyzer();
        let t = ts(1);
        let mut input = frame(
            1,
            t,
            vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t)],
        );
        input.rois[0].requires_scooper = false;

        let outcome = analyzer.analyze(&input);
        assert!(outcome.violations.is_empty());
        // Presence is still tracked for reporting
        assert_eq!(analyzer.stats().active_sequences, 1);
    }

    #[test]
    fn test_worker_attribution_in_event() {
        let mut analyzer = analyzer();
        let t = ts(1);
        let outcome = analyzer.analyze(&frame(
            1,
            t,
            vec![
                detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t),
                detection(DetectionClass::Person, 540.0, 480.0, "frame_1", t),
            ],
        ));

        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].worker_id, Some(1));
        assert!(outcome.violations[0].description.starts_with("Worker 1"));
    }

    #[test]
    fn test_summary_counts() {
        let mut analyzer = analyzer();
        let t = ts(1);
        let outcome = analyzer.analyze(&frame(
            1,
            t,
            vec![
                detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t),
                detection(DetectionClass::Person, 540.0, 480.0, "frame_1", t),
                detection(DetectionClass::Pizza, 300.0, 300.0, "frame_1", t),
            ],
        ));

        assert_eq!(outcome.summary.total_detections, 3);
        assert_eq!(outcome.summary.hands_detected, 1);
        assert_eq!(outcome.summary.persons_detected, 1);
        assert_eq!(outcome.summary.scoopers_detected, 0);
        assert_eq!(outcome.summary.violations_found, 1);
    }

    #[test]
    fn test_cancel_closes_everything() {
        let mut analyzer = analyzer();
        let t = ts(1);
        analyzer.analyze(&frame(
            1,
            t,
            vec![detection(DetectionClass::Hand, 520.0, 420.0, "frame_1", t)],
        ));
        assert_eq!(analyzer.stats().active_sequences, 1);

        analyzer.cancel();
        assert_eq!(analyzer.stats().active_sequences, 0);
        assert_eq!(analyzer.stats().cooldown_entries, 0);
    }
}
