//! ROI sequence tracking
//!
//! Tracks each hand's complete entry-to-exit presence inside each ingredient
//! region as a single sequence (one "work session"). Sequences open when a
//! hand's center first appears inside a region, extend on every frame it
//! stays, and close on the first frame it is gone.
//!
//! # Features
//! - One active sequence per (hand identity, region) key
//! - Bounded history ring of completed sequences
//! - Staleness janitor that force-closes abandoned sequences
//! - Per-frame scooper usage and distance recording for compliance reports
//!
//! # Example
//! ```
//! use scooper_watch_sequence_tracking::{
//!     HandIdentity, SequenceKey, SequenceTracker, SequenceTrackerConfig,
//! };
//! use scooper_watch_common::Point;
//! use chrono::Utc;
//!
//! let mut tracker = SequenceTracker::new(SequenceTrackerConfig::default());
//! let key = SequenceKey::new(HandIdentity::new(0, Some(1)), "sauce_station");
//! let event = tracker.observe_inside(
//!     key.clone(), "frame_1", Utc::now(), Point::new(520.0, 420.0), false, None,
//! );
//! assert!(event.is_entry());
//! ```

pub mod association;
pub mod worker;

use chrono::{DateTime, Duration, Utc};
use scooper_watch_common::Point;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

pub use association::associate_hands_with_workers;
pub use worker::{ActionType, WorkerRegistry, WorkerTracker};

/// Best-effort identity of a hand across frames.
///
/// Derived from the hand's index within the frame plus the associated
/// worker, if any. There is no cross-frame tracker behind this: detection
/// ordering must be stable for the label to correlate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandIdentity {
    pub hand_index: usize,
    pub worker_id: Option<u32>,
}

impl HandIdentity {
    #[must_use]
    pub fn new(hand_index: usize, worker_id: Option<u32>) -> Self {
        Self {
            hand_index,
            worker_id,
        }
    }
}

impl fmt::Display for HandIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.worker_id {
            Some(worker) => write!(f, "hand_{}_worker_{}", self.hand_index, worker),
            None => write!(f, "hand_{}", self.hand_index),
        }
    }
}

/// Key identifying one hand/region pairing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceKey {
    pub hand: HandIdentity,
    pub roi_name: String,
}

impl SequenceKey {
    #[must_use]
    pub fn new(hand: HandIdentity, roi_name: impl Into<String>) -> Self {
        Self {
            hand,
            roi_name: roi_name.into(),
        }
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.hand, self.roi_name)
    }
}

/// One uninterrupted presence of a hand inside a region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiSequence {
    pub sequence_id: String,
    pub key: SequenceKey,
    pub entry_frame_id: String,
    pub exit_frame_id: Option<String>,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Timestamp of the most recent recorded frame
    pub last_seen: DateTime<Utc>,
    pub frames: Vec<String>,
    pub positions: Vec<Point>,
    pub scooper_usage: Vec<bool>,
    pub scooper_distances: Vec<Option<f32>>,
}

impl RoiSequence {
    fn open(
        sequence_id: String,
        key: SequenceKey,
        frame_id: &str,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            sequence_id,
            key,
            entry_frame_id: frame_id.to_string(),
            exit_frame_id: None,
            entry_time: time,
            exit_time: None,
            last_seen: time,
            frames: Vec::new(),
            positions: Vec::new(),
            scooper_usage: Vec::new(),
            scooper_distances: Vec::new(),
        }
    }

    /// Record one frame's observation. A frame id already recorded at the
    /// tail is skipped so that re-submitted frames extend rather than
    /// duplicate.
    fn record(
        &mut self,
        frame_id: &str,
        time: DateTime<Utc>,
        position: Point,
        using_scooper: bool,
        scooper_distance: Option<f32>,
    ) {
        if self.frames.last().is_some_and(|last| last == frame_id) {
            debug!(sequence = %self.sequence_id, frame_id, "duplicate frame submission ignored");
            return;
        }
        self.frames.push(frame_id.to_string());
        self.positions.push(position);
        self.scooper_usage.push(using_scooper);
        self.scooper_distances.push(scooper_distance);
        self.last_seen = time;
    }

    fn close(&mut self, exit_frame_id: &str, time: DateTime<Utc>) {
        self.exit_frame_id = Some(exit_frame_id.to_string());
        self.exit_time = Some(time);
    }

    /// Whether the sequence has been closed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.exit_time.is_some()
    }

    /// Duration between entry and exit, zero while still open
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self.exit_time {
            Some(exit) => exit - self.entry_time,
            None => Duration::zero(),
        }
    }

    /// Percentage of recorded frames in which the scooper was in use
    #[must_use]
    pub fn scooper_usage_percent(&self) -> f32 {
        if self.scooper_usage.is_empty() {
            return 0.0;
        }
        let used = self.scooper_usage.iter().filter(|&&u| u).count();
        used as f32 / self.scooper_usage.len() as f32 * 100.0
    }

    /// Whether scooper usage met the required share of frames
    #[must_use]
    pub fn used_properly(&self, required_percent: f32) -> bool {
        !self.scooper_usage.is_empty() && self.scooper_usage_percent() >= required_percent
    }
}

/// Outcome of observing a hand inside a region this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    /// A new sequence opened (the hand just entered)
    Entered,
    /// An existing sequence was extended
    Continued,
}

impl SequenceEvent {
    #[must_use]
    pub fn is_entry(&self) -> bool {
        matches!(self, Self::Entered)
    }
}

/// Sequence tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceTrackerConfig {
    /// Force-close active sequences idle longer than this (seconds)
    pub staleness_secs: i64,
    /// Completed sequences retained for reporting
    pub history_capacity: usize,
}

impl Default for SequenceTrackerConfig {
    fn default() -> Self {
        Self {
            staleness_secs: 30,
            history_capacity: 50,
        }
    }
}

/// Tracks active and completed sequences for one session
pub struct SequenceTracker {
    config: SequenceTrackerConfig,
    active: HashMap<SequenceKey, RoiSequence>,
    completed: VecDeque<RoiSequence>,
    next_sequence: u64,
}

impl SequenceTracker {
    #[must_use]
    pub fn new(config: SequenceTrackerConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
            completed: VecDeque::new(),
            next_sequence: 0,
        }
    }

    /// Observe a hand inside a region: open a sequence on first contact,
    /// extend the active one otherwise.
    pub fn observe_inside(
        &mut self,
        key: SequenceKey,
        frame_id: &str,
        time: DateTime<Utc>,
        position: Point,
        using_scooper: bool,
        scooper_distance: Option<f32>,
    ) -> SequenceEvent {
        if let Some(sequence) = self.active.get_mut(&key) {
            sequence.record(frame_id, time, position, using_scooper, scooper_distance);
            debug!(key = %key, frame_id, "sequence continued");
            return SequenceEvent::Continued;
        }

        self.next_sequence += 1;
        let sequence_id = format!("seq_{}", self.next_sequence);
        let mut sequence = RoiSequence::open(sequence_id, key.clone(), frame_id, time);
        sequence.record(frame_id, time, position, using_scooper, scooper_distance);
        info!(key = %key, frame_id, sequence = %sequence.sequence_id, "sequence opened");
        self.active.insert(key, sequence);
        SequenceEvent::Entered
    }

    /// Observe that a hand with an active sequence is outside its region
    /// this frame: close the sequence and move it to history.
    pub fn observe_outside(
        &mut self,
        key: &SequenceKey,
        frame_id: &str,
        time: DateTime<Utc>,
    ) -> Option<RoiSequence> {
        let mut sequence = self.active.remove(key)?;
        sequence.close(frame_id, time);
        info!(
            key = %key,
            frame_id,
            frames = sequence.frames.len(),
            usage_percent = sequence.scooper_usage_percent(),
            "sequence closed"
        );
        self.push_completed(sequence.clone());
        Some(sequence)
    }

    /// Whether an active sequence exists for the key
    #[must_use]
    pub fn has_active(&self, key: &SequenceKey) -> bool {
        self.active.contains_key(key)
    }

    /// The active sequence for a key, if one exists
    #[must_use]
    pub fn active_sequence(&self, key: &SequenceKey) -> Option<&RoiSequence> {
        self.active.get(key)
    }

    /// Keys of all currently active sequences
    #[must_use]
    pub fn active_keys(&self) -> Vec<SequenceKey> {
        self.active.keys().cloned().collect()
    }

    /// Force-close sequences whose hands have not been seen within the
    /// staleness budget. Returns the closed keys. Force-closed sequences
    /// never produce violations; they only stop leaking state.
    pub fn force_close_stale(&mut self, now: DateTime<Utc>) -> Vec<SequenceKey> {
        let budget = Duration::seconds(self.config.staleness_secs);
        let stale: Vec<SequenceKey> = self
            .active
            .iter()
            .filter(|(_, seq)| now - seq.last_seen > budget)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            if let Some(mut sequence) = self.active.remove(key) {
                warn!(key = %key, "force-closing stale sequence");
                let last_frame = sequence
                    .frames
                    .last()
                    .cloned()
                    .unwrap_or_else(|| sequence.entry_frame_id.clone());
                sequence.close(&last_frame, now);
                self.push_completed(sequence);
            }
        }

        stale
    }

    /// Close every active sequence immediately (session cancellation)
    pub fn close_all(&mut self, now: DateTime<Utc>) -> Vec<SequenceKey> {
        let keys: Vec<SequenceKey> = self.active.keys().cloned().collect();
        for key in &keys {
            if let Some(mut sequence) = self.active.remove(key) {
                let last_frame = sequence
                    .frames
                    .last()
                    .cloned()
                    .unwrap_or_else(|| sequence.entry_frame_id.clone());
                sequence.close(&last_frame, now);
                self.push_completed(sequence);
            }
        }
        keys
    }

    fn push_completed(&mut self, sequence: RoiSequence) {
        self.completed.push_back(sequence);
        while self.completed.len() > self.config.history_capacity {
            self.completed.pop_front();
        }
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Completed sequences, oldest first
    pub fn completed(&self) -> impl Iterator<Item = &RoiSequence> {
        self.completed.iter()
    }
}
