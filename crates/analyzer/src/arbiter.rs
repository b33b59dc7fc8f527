//! Violation arbiter
//!
//! Consulted exactly once per sequence, at the frame where a hand enters a
//! region. Enforces the two deduplication guarantees:
//!
//! - at most one violation per entry-to-exit sequence, and
//! - at most one violation per key within any cooldown window, regardless
//!   of sequence turnover.
//!
//! The check-and-set is a single `&mut self` call on state owned by one
//! session task, so duplicate emission for a key cannot race.

use chrono::{DateTime, Duration, Utc};
use scooper_watch_sequence_tracking::SequenceKey;
use std::collections::HashMap;
use tracing::{debug, info};

/// Arbiter configuration
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Minimum gap between violations per key (seconds)
    pub work_session_cooldown_secs: i64,
    /// Cooldown entries dropped this long after their last write (seconds)
    pub cooldown_retention_secs: i64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            work_session_cooldown_secs: 30,
            cooldown_retention_secs: 60,
        }
    }
}

/// Outcome of evaluating a sequence entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    /// Hand entered with a scooper; the sequence is compliant and is never
    /// re-evaluated
    Compliant,
    /// The currently-open sequence already produced a violation
    AlreadyFlagged,
    /// A violation for this key fired within the cooldown window
    CooldownActive,
    /// Emit a violation; the arbiter has recorded it
    Violate,
}

/// Per-session dedup and cooldown registries
pub struct ViolationArbiter {
    config: ArbiterConfig,
    /// sequence key -> violation id of the currently-open sequence
    sequence_violations: HashMap<SequenceKey, String>,
    /// sequence key -> time of the last emitted violation
    violation_timestamps: HashMap<SequenceKey, DateTime<Utc>>,
}

impl ViolationArbiter {
    #[must_use]
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            config,
            sequence_violations: HashMap::new(),
            violation_timestamps: HashMap::new(),
        }
    }

    /// Evaluate a sequence entry. When the verdict is [`EntryDecision::Violate`]
    /// both registries have already been stamped with `violation_id` — the
    /// check and the set are one atomic step.
    pub fn evaluate_entry(
        &mut self,
        key: &SequenceKey,
        using_scooper: bool,
        violation_id: &str,
        now: DateTime<Utc>,
    ) -> EntryDecision {
        if using_scooper {
            debug!(key = %key, "entry compliant, scooper in use");
            return EntryDecision::Compliant;
        }

        if self.sequence_violations.contains_key(key) {
            debug!(key = %key, "sequence already has a violation");
            return EntryDecision::AlreadyFlagged;
        }

        if let Some(last) = self.violation_timestamps.get(key) {
            let elapsed = now - *last;
            if elapsed < Duration::seconds(self.config.work_session_cooldown_secs) {
                info!(
                    key = %key,
                    elapsed_secs = elapsed.num_seconds(),
                    "work-session cooldown active, violation suppressed"
                );
                return EntryDecision::CooldownActive;
            }
        }

        self.sequence_violations
            .insert(key.clone(), violation_id.to_string());
        self.violation_timestamps.insert(key.clone(), now);
        EntryDecision::Violate
    }

    /// A sequence closed: the per-sequence marker is purged so a fresh
    /// entry can be judged again. The cooldown timestamp survives closure
    /// and keeps suppressing re-entries within the same work session; it
    /// ages out via [`Self::prune`].
    pub fn on_sequence_closed(&mut self, key: &SequenceKey) {
        if let Some(violation_id) = self.sequence_violations.remove(key) {
            debug!(key = %key, violation_id, "sequence closed with violation");
        }
    }

    /// Drop cooldown entries past retention (the work session ended)
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let retention = Duration::seconds(self.config.cooldown_retention_secs);
        self.violation_timestamps
            .retain(|_, last| now - *last <= retention);
    }

    /// Session cancelled: drop all registries
    pub fn clear(&mut self) {
        self.sequence_violations.clear();
        self.violation_timestamps.clear();
    }

    #[must_use]
    pub fn cooldown_entries(&self) -> usize {
        self.violation_timestamps.len()
    }

    #[must_use]
    pub fn flagged_sequences(&self) -> usize {
        self.sequence_violations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scooper_watch_sequence_tracking::HandIdentity;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn key() -> SequenceKey {
        SequenceKey::new(HandIdentity::new(0, Some(1)), "sauce_station")
    }

    #[test]
    fn test_compliant_entry_records_nothing() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        let decision = arbiter.evaluate_entry(&key(), true, "v1", ts(0));
        assert_eq!(decision, EntryDecision::Compliant);
        assert_eq!(arbiter.flagged_sequences(), 0);
        assert_eq!(arbiter.cooldown_entries(), 0);
    }

    #[test]
    fn test_violation_is_recorded_atomically() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        let decision = arbiter.evaluate_entry(&key(), false, "v1", ts(0));
        assert_eq!(decision, EntryDecision::Violate);
        assert_eq!(arbiter.flagged_sequences(), 1);
        assert_eq!(arbiter.cooldown_entries(), 1);
    }

    #[test]
    fn test_open_sequence_never_double_fires() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        arbiter.evaluate_entry(&key(), false, "v1", ts(0));
        let second = arbiter.evaluate_entry(&key(), false, "v2", ts(1));
        assert_eq!(second, EntryDecision::AlreadyFlagged);
    }

    #[test]
    fn test_cooldown_survives_sequence_close() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        arbiter.evaluate_entry(&key(), false, "v1", ts(0));
        arbiter.on_sequence_closed(&key());
        assert_eq!(arbiter.flagged_sequences(), 0);

        // Re-entry 2 s later: same work session, suppressed
        let decision = arbiter.evaluate_entry(&key(), false, "v2", ts(2));
        assert_eq!(decision, EntryDecision::CooldownActive);
    }

    #[test]
    fn test_cooldown_expires() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        arbiter.evaluate_entry(&key(), false, "v1", ts(0));
        arbiter.on_sequence_closed(&key());

        let decision = arbiter.evaluate_entry(&key(), false, "v2", ts(31));
        assert_eq!(decision, EntryDecision::Violate);
    }

    #[test]
    fn test_suppressed_entry_does_not_extend_cooldown() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        arbiter.evaluate_entry(&key(), false, "v1", ts(0));
        arbiter.on_sequence_closed(&key());

        // Suppressed at t=29 must not reset the window
        assert_eq!(
            arbiter.evaluate_entry(&key(), false, "v2", ts(29)),
            EntryDecision::CooldownActive
        );
        assert_eq!(
            arbiter.evaluate_entry(&key(), false, "v3", ts(31)),
            EntryDecision::Violate
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        let other = SequenceKey::new(HandIdentity::new(1, Some(2)), "sauce_station");

        assert_eq!(
            arbiter.evaluate_entry(&key(), false, "v1", ts(0)),
            EntryDecision::Violate
        );
        assert_eq!(
            arbiter.evaluate_entry(&other, false, "v2", ts(0)),
            EntryDecision::Violate
        );
    }

    #[test]
    fn test_prune_ages_out_cooldowns() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        arbiter.evaluate_entry(&key(), false, "v1", ts(0));
        arbiter.on_sequence_closed(&key());

        arbiter.prune(ts(59));
        assert_eq!(arbiter.cooldown_entries(), 1);
        arbiter.prune(ts(61));
        assert_eq!(arbiter.cooldown_entries(), 0);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut arbiter = ViolationArbiter::new(ArbiterConfig::default());
        arbiter.evaluate_entry(&key(), false, "v1", ts(0));
        arbiter.clear();
        assert_eq!(arbiter.flagged_sequences(), 0);
        assert_eq!(arbiter.cooldown_entries(), 0);
    }
}
