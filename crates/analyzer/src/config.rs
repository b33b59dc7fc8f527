//! Analyzer configuration
//!
//! Env-var driven with sensible defaults, so the pipeline runs unconfigured
//! in development and picks up deployment settings from the environment.

use scooper_watch_scooper_usage::UsageConfig;
use scooper_watch_sequence_tracking::SequenceTrackerConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Pipeline behavior knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Tier-1 distance: scooper within this many pixels counts as held
    pub scooper_active_max_px: f32,
    /// Tier-2 distance: scooper within this many pixels may count via fallback
    pub scooper_nearby_max_px: f32,
    /// Accept a nearby scooper as compliant
    pub allow_nearby_scooper_fallback: bool,
    /// Minimum gap between violations for the same hand/region key (seconds)
    pub work_session_cooldown_secs: i64,
    /// Force-close active sequences idle longer than this (seconds)
    pub sequence_staleness_secs: i64,
    /// Share of frames that must show scooper use for a completed sequence
    /// to be reported as proper (informational only)
    pub scooper_usage_required_percent: f32,
    /// Maximum hand-to-person distance for worker association
    pub hand_worker_assoc_max_px: f32,
    /// Use the rich-evidence classifier instead of the tiered one
    pub rich_mode_enabled: bool,
    /// Cooldown entries are dropped this long after their last write
    pub cooldown_retention_secs: i64,
    /// Completed sequences retained per session
    pub completed_history: usize,
    /// Analyzed frames retained for the rich-mode classifier
    pub frame_history: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            scooper_active_max_px: 50.0,
            scooper_nearby_max_px: 100.0,
            allow_nearby_scooper_fallback: true,
            work_session_cooldown_secs: 30,
            sequence_staleness_secs: 30,
            scooper_usage_required_percent: 70.0,
            hand_worker_assoc_max_px: 150.0,
            rich_mode_enabled: false,
            cooldown_retention_secs: 60,
            completed_history: 50,
            frame_history: 100,
        }
    }
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl AnalyzerConfig {
    /// Read the recognized configuration envelope from the environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scooper_active_max_px: env_parsed("SCOOPER_ACTIVE_MAX_PX", defaults.scooper_active_max_px),
            scooper_nearby_max_px: env_parsed("SCOOPER_NEARBY_MAX_PX", defaults.scooper_nearby_max_px),
            allow_nearby_scooper_fallback: env_flag(
                "ALLOW_NEARBY_SCOOPER_FALLBACK",
                defaults.allow_nearby_scooper_fallback,
            ),
            work_session_cooldown_secs: env_parsed(
                "WORK_SESSION_COOLDOWN_SEC",
                defaults.work_session_cooldown_secs,
            ),
            sequence_staleness_secs: env_parsed(
                "SEQUENCE_STALENESS_SEC",
                defaults.sequence_staleness_secs,
            ),
            scooper_usage_required_percent: env_parsed(
                "SCOOPER_USAGE_REQUIRED_PERCENT",
                defaults.scooper_usage_required_percent,
            ),
            hand_worker_assoc_max_px: env_parsed(
                "HAND_WORKER_ASSOC_MAX_PX",
                defaults.hand_worker_assoc_max_px,
            ),
            rich_mode_enabled: env_flag("RICH_MODE_ENABLED", defaults.rich_mode_enabled),
            ..defaults
        }
    }

    /// Classifier configuration derived from the envelope
    #[must_use]
    pub fn usage_config(&self) -> UsageConfig {
        UsageConfig {
            active_max_px: self.scooper_active_max_px,
            nearby_max_px: self.scooper_nearby_max_px,
            allow_nearby_fallback: self.allow_nearby_scooper_fallback,
            ..UsageConfig::default()
        }
    }

    /// Sequence tracker configuration derived from the envelope
    #[must_use]
    pub fn tracker_config(&self) -> SequenceTrackerConfig {
        SequenceTrackerConfig {
            staleness_secs: self.sequence_staleness_secs,
            history_capacity: self.completed_history,
        }
    }
}
