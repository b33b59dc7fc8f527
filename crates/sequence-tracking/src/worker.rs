//! Per-worker action tracking
//!
//! Classifies hand motion into coarse actions from recent positions. Used
//! only for telemetry and richer violation descriptions; it never gates
//! violation decisions.

use chrono::{DateTime, Duration, Utc};
use scooper_watch_common::{Detection, DetectionClass, Point};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

const DETECTION_HISTORY_CAPACITY: usize = 50;
const HAND_POSITION_CAPACITY: usize = 20;
/// Positions considered when classifying the current action
const ACTION_WINDOW: usize = 5;
/// Steps below this are noise for reversal counting
const MIN_STEP_FOR_DIRECTION: f32 = 5.0;

/// Coarse classification of what a worker's hand is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Cleaning,
    Grabbing,
    Idle,
    Unknown,
}

impl ActionType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleaning => "cleaning",
            Self::Grabbing => "grabbing",
            Self::Idle => "idle",
            Self::Unknown => "unknown",
        }
    }
}

/// Tracks one worker's recent detections and hand movement
pub struct WorkerTracker {
    pub worker_id: u32,
    detection_history: VecDeque<Detection>,
    hand_positions: VecDeque<(Point, DateTime<Utc>)>,
    current_action: ActionType,
    last_seen: DateTime<Utc>,
}

impl WorkerTracker {
    #[must_use]
    pub fn new(worker_id: u32, now: DateTime<Utc>) -> Self {
        Self {
            worker_id,
            detection_history: VecDeque::with_capacity(DETECTION_HISTORY_CAPACITY),
            hand_positions: VecDeque::with_capacity(HAND_POSITION_CAPACITY),
            current_action: ActionType::Idle,
            last_seen: now,
        }
    }

    /// Feed this frame's detections attributed to the worker
    pub fn update(&mut self, detections: &[Detection], now: DateTime<Utc>) {
        self.last_seen = now;

        if let Some(hand) = detections.iter().find(|d| d.class == DetectionClass::Hand) {
            self.hand_positions.push_back((hand.center, now));
            while self.hand_positions.len() > HAND_POSITION_CAPACITY {
                self.hand_positions.pop_front();
            }
            self.current_action = self.classify_action();
        }

        for detection in detections {
            self.detection_history.push_back(detection.clone());
            while self.detection_history.len() > DETECTION_HISTORY_CAPACITY {
                self.detection_history.pop_front();
            }
        }
    }

    #[must_use]
    pub fn current_action(&self) -> ActionType {
        self.current_action
    }

    #[must_use]
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Classify the action from the most recent hand positions.
    ///
    /// Cleaning shows as repeated direction reversals at moderate speed,
    /// idle as near-zero movement, grabbing as sustained directed movement.
    fn classify_action(&self) -> ActionType {
        if self.hand_positions.len() < 3 {
            return ActionType::Unknown;
        }

        let recent: Vec<Point> = self
            .hand_positions
            .iter()
            .rev()
            .take(ACTION_WINDOW)
            .rev()
            .map(|(p, _)| *p)
            .collect();

        let mut total_movement = 0.0;
        let mut direction_changes = 0;

        for i in 1..recent.len() {
            let prev = recent[i - 1];
            let curr = recent[i];
            total_movement += prev.distance_to(curr);

            if i > 1 {
                let before = recent[i - 2];
                let dir1 = (prev.x - before.x, prev.y - before.y);
                let dir2 = (curr.x - prev.x, curr.y - prev.y);

                if dir1.0.abs() > MIN_STEP_FOR_DIRECTION || dir1.1.abs() > MIN_STEP_FOR_DIRECTION {
                    let dot = dir1.0 * dir2.0 + dir1.1 * dir2.1;
                    if dot < 0.0 {
                        direction_changes += 1;
                    }
                }
            }
        }

        let avg_movement = total_movement / recent.len() as f32;
        debug!(
            worker = self.worker_id,
            avg_movement, direction_changes, "classifying action"
        );

        if direction_changes >= 2 && (15.0..=40.0).contains(&avg_movement) {
            ActionType::Cleaning
        } else if avg_movement < 8.0 {
            ActionType::Idle
        } else if avg_movement > 12.0 && direction_changes <= 1 {
            ActionType::Grabbing
        } else {
            ActionType::Unknown
        }
    }
}

/// All workers currently observed in one session
pub struct WorkerRegistry {
    workers: HashMap<u32, WorkerTracker>,
    inactive_after_secs: i64,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
            inactive_after_secs: 30,
        }
    }

    /// Update the tracker for a worker with this frame's detections
    pub fn update_worker(&mut self, worker_id: u32, detections: &[Detection], now: DateTime<Utc>) {
        self.workers
            .entry(worker_id)
            .or_insert_with(|| WorkerTracker::new(worker_id, now))
            .update(detections, now);
    }

    /// Current action for a worker, if tracked
    #[must_use]
    pub fn action_for(&self, worker_id: u32) -> Option<ActionType> {
        self.workers.get(&worker_id).map(WorkerTracker::current_action)
    }

    /// Drop workers not seen within the inactivity budget
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let budget = Duration::seconds(self.inactive_after_secs);
        self.workers.retain(|_, w| now - w.last_seen() <= budget);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Iterate over tracked workers
    pub fn iter(&self) -> impl Iterator<Item = &WorkerTracker> {
        self.workers.values()
    }
}
