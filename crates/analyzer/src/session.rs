//! Per-session workers
//!
//! Frames from one capture session are processed in arrival order by a
//! dedicated task that owns that session's analyzer state; sessions run
//! independently in parallel. Within a frame the detector call and the ROI
//! fetch run concurrently and join before analysis.
//!
//! Failure policy per the pipeline contract: a failed detector call falls
//! back to an empty detection list (zero violations beats false ones), a
//! failed ROI fetch past the snapshot window skips the frame, and
//! violation-store writes that stay failing beyond their retry deadline
//! halt the affected session while every other session continues.

use crate::config::AnalyzerConfig;
use crate::engine::{FrameInput, SessionAnalyzer, SessionStats};
use crate::violation::ViolationEvent;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use scooper_watch_annotator::{annotate_violation_frame, AnnotationStyle, ViolationOverlay};
use scooper_watch_clients::{DetectorApi, RoiProvider};
use scooper_watch_common::{Detection, PipelineError, SourceInfo};
use scooper_watch_storage::{
    EventPublisher, FrameStore, StorageError, ViolationRecord, ViolationStore,
    VIOLATION_DETECTED_TOPIC,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Frames buffered per session before ingest backpressure kicks in
const SESSION_QUEUE_CAPACITY: usize = 32;
/// How long a failed violation write may sit in the retry queue
const WRITE_RETRY_WINDOW: Duration = Duration::from_secs(60);

/// External collaborators injected into every session worker
pub struct PipelineDeps {
    pub detector: Arc<dyn DetectorApi>,
    pub rois: Arc<dyn RoiProvider>,
    pub frames: Arc<dyn FrameStore>,
    pub violations: Arc<dyn ViolationStore>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// One frame pushed into the pipeline
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub frame_id: String,
    pub frame_number: u64,
    pub timestamp: DateTime<Utc>,
    /// JPEG bytes; absent in analyze-only submissions
    pub jpeg: Option<Vec<u8>>,
    /// Pre-computed detections; when present the detector is not called
    pub detections: Option<Vec<Detection>>,
    pub source_info: SourceInfo,
}

struct SessionHandle {
    tx: mpsc::Sender<FrameJob>,
    stats: Arc<RwLock<SessionStats>>,
    join: JoinHandle<()>,
}

/// Routes frames to per-session workers, spawning them on first contact
pub struct SessionManager {
    deps: Arc<PipelineDeps>,
    config: AnalyzerConfig,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(deps: PipelineDeps, config: AnalyzerConfig) -> Self {
        Self {
            deps: Arc::new(deps),
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a frame for analysis. Applies backpressure when the session's
    /// queue is full; fails once a session has been halted.
    pub async fn submit(&self, session_id: &str, job: FrameJob) -> Result<(), PipelineError> {
        let tx = {
            let mut sessions = self.sessions.lock().await;

            if let Some(handle) = sessions.get(session_id) {
                if handle.join.is_finished() {
                    // The worker only exits early when halted
                    return Err(PipelineError::SessionHalted(session_id.to_string()));
                }
                handle.tx.clone()
            } else {
                let handle = spawn_session(
                    session_id.to_string(),
                    self.config.clone(),
                    Arc::clone(&self.deps),
                );
                let tx = handle.tx.clone();
                sessions.insert(session_id.to_string(), handle);
                tx
            }
        };

        tx.send(job)
            .await
            .map_err(|_| PipelineError::SessionHalted(session_id.to_string()))
    }

    /// Stats snapshot for one session
    pub async fn stats(&self, session_id: &str) -> Option<SessionStats> {
        let sessions = self.sessions.lock().await;
        let handle = sessions.get(session_id)?;
        let stats = handle.stats.read().await.clone();
        Some(stats)
    }

    /// Number of known sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Clean shutdown: stop accepting frames, drain every session's queue,
    /// force-close active sequences and flush pending writes.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, SessionHandle)> =
            self.sessions.lock().await.drain().collect();

        info!(sessions = handles.len(), "draining sessions for shutdown");
        for (session_id, handle) in handles {
            drop(handle.tx);
            if let Err(e) = handle.join.await {
                error!(session = %session_id, error = %e, "session worker panicked");
            }
        }
    }
}

fn spawn_session(
    session_id: String,
    config: AnalyzerConfig,
    deps: Arc<PipelineDeps>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
    let stats = Arc::new(RwLock::new(SessionStats::default()));
    let stats_for_task = Arc::clone(&stats);

    info!(session = %session_id, "starting session worker");
    let join = tokio::spawn(run_session(session_id, config, deps, rx, stats_for_task));

    SessionHandle { tx, stats, join }
}

/// A violation record waiting for the store to come back
struct PendingWrite {
    record: ViolationRecord,
    queued_at: Instant,
}

async fn run_session(
    session_id: String,
    config: AnalyzerConfig,
    deps: Arc<PipelineDeps>,
    mut rx: mpsc::Receiver<FrameJob>,
    stats: Arc<RwLock<SessionStats>>,
) {
    let mut analyzer = SessionAnalyzer::new(&session_id, config);
    let mut pending_writes: VecDeque<PendingWrite> = VecDeque::new();

    while let Some(job) = rx.recv().await {
        process_frame(&session_id, &mut analyzer, &deps, job, &mut pending_writes).await;

        if let Err(e) = drain_pending_writes(&deps, &mut pending_writes).await {
            error!(
                session = %session_id,
                error = %e,
                "violation store unreachable past the retry window, halting session"
            );
            analyzer.mark_halted();
            *stats.write().await = analyzer.stats().clone();
            return;
        }

        *stats.write().await = analyzer.stats().clone();
    }

    // Channel closed: drain finished, clean up session state
    analyzer.cancel();
    flush_pending_writes(&deps, &mut pending_writes).await;
    *stats.write().await = analyzer.stats().clone();
    info!(session = %session_id, "session worker stopped");
}

async fn process_frame(
    session_id: &str,
    analyzer: &mut SessionAnalyzer,
    deps: &PipelineDeps,
    job: FrameJob,
    pending_writes: &mut VecDeque<PendingWrite>,
) {
    // Detector call and ROI fetch run concurrently and join before analysis
    let detections_fut = fetch_detections(deps, &job);
    let rois_fut = deps.rois.current_rois();
    let (detections, rois_result) = tokio::join!(detections_fut, rois_fut);

    let rois = match rois_result {
        Ok(rois) => rois,
        Err(e) => {
            warn!(
                session = %session_id,
                frame = %job.frame_id,
                error = %e,
                "no ROI data available, skipping frame"
            );
            return;
        }
    };

    let input = FrameInput {
        frame_id: job.frame_id.clone(),
        frame_number: job.frame_number,
        timestamp: job.timestamp,
        detections,
        rois,
    };
    let outcome = analyzer.analyze(&input);

    for violation in &outcome.violations {
        persist_violation(session_id, deps, &job, violation, pending_writes).await;
        deps.publisher
            .publish(
                VIOLATION_DETECTED_TOPIC,
                violation.publish_payload(),
                "high",
            )
            .await;
    }
}

async fn fetch_detections(deps: &PipelineDeps, job: &FrameJob) -> Vec<Detection> {
    if let Some(detections) = &job.detections {
        return detections.clone();
    }

    let Some(jpeg) = &job.jpeg else {
        warn!(frame = %job.frame_id, "frame carries neither image nor detections");
        return Vec::new();
    };

    match deps
        .detector
        .detect(&job.frame_id, jpeg, job.timestamp, &job.source_info)
        .await
    {
        Ok(detections) => detections,
        Err(e) => {
            // Empty detections are the safe fallback: no hands seen means
            // no violations, never false ones
            warn!(frame = %job.frame_id, error = %e, "detector unavailable, treating frame as empty");
            Vec::new()
        }
    }
}

async fn persist_violation(
    session_id: &str,
    deps: &PipelineDeps,
    job: &FrameJob,
    violation: &ViolationEvent,
    pending_writes: &mut VecDeque<PendingWrite>,
) {
    let (frame_path, frame_base64) = match &job.jpeg {
        Some(jpeg) => annotate_and_store(session_id, deps, jpeg, violation).await,
        None => (None, None),
    };

    let record = build_record(violation, frame_path, frame_base64);
    match deps.violations.store(&record).await {
        Ok(()) => {}
        Err(e) if e.is_transient() => {
            warn!(
                violation = %violation.violation_id,
                error = %e,
                "violation write queued for retry"
            );
            pending_writes.push_back(PendingWrite {
                record,
                queued_at: Instant::now(),
            });
        }
        Err(e) => {
            error!(
                violation = %violation.violation_id,
                error = %e,
                "violation record rejected by store"
            );
        }
    }
}

async fn annotate_and_store(
    session_id: &str,
    deps: &PipelineDeps,
    jpeg: &[u8],
    violation: &ViolationEvent,
) -> (Option<String>, Option<String>) {
    let overlay = ViolationOverlay {
        hand_bbox: violation.evidence.hand_bbox,
        label: violation.overlay_label(),
        roi_name: violation.roi_name.clone(),
        roi_bounds: violation.evidence.roi_bounds,
        severity: violation.severity,
        timestamp: violation.created_at,
    };

    let annotated = match annotate_violation_frame(jpeg, &overlay, &AnnotationStyle::default()) {
        Ok(annotated) => annotated,
        Err(e) => {
            warn!(frame = %violation.frame_id, error = %e, "frame annotation failed");
            return (None, None);
        }
    };

    let sidecar = match serde_json::to_value(violation) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "could not serialize evidence sidecar");
            serde_json::Value::Null
        }
    };

    match deps
        .frames
        .write_frame(
            session_id,
            &violation.frame_id,
            violation.created_at,
            &annotated.full_jpeg,
            &sidecar,
        )
        .await
    {
        Ok(stored) => {
            debug!(path = %stored.frame_path.display(), "annotated frame persisted");
            (
                Some(stored.frame_path.to_string_lossy().into_owned()),
                Some(BASE64.encode(&annotated.inline_jpeg)),
            )
        }
        Err(e) => {
            error!(frame = %violation.frame_id, error = %e, "failed to persist annotated frame");
            (None, Some(BASE64.encode(&annotated.inline_jpeg)))
        }
    }
}

fn build_record(
    violation: &ViolationEvent,
    frame_path: Option<String>,
    frame_base64: Option<String>,
) -> ViolationRecord {
    ViolationRecord {
        session_id: violation.session_id.clone(),
        worker_id: violation.worker_id,
        roi_zone_id: violation.roi_name.clone(),
        frame_number: violation.frame_number,
        frame_path,
        frame_base64,
        violation_type: violation.violation_type.as_str().to_string(),
        confidence: violation.confidence,
        severity: violation.severity.as_str().to_string(),
        description: violation.description.clone(),
        bounding_boxes: vec![violation.evidence.hand_bbox],
        hand_position: violation.evidence.hand_center,
        scooper_present: violation.evidence.closest_scooper_distance.is_some(),
        scooper_distance: violation.evidence.closest_scooper_distance,
        movement_pattern: violation
            .evidence
            .movement_pattern
            .map(|a| a.as_str().to_string()),
    }
}

/// Retry queued writes. An entry that keeps failing past the retry window
/// is a fatal persistence loss for this session.
async fn drain_pending_writes(
    deps: &PipelineDeps,
    pending_writes: &mut VecDeque<PendingWrite>,
) -> Result<(), StorageError> {
    let mut still_pending = VecDeque::new();
    while let Some(pending) = pending_writes.pop_front() {
        match deps.violations.store(&pending.record).await {
            Ok(()) => {
                info!(
                    roi = %pending.record.roi_zone_id,
                    "queued violation write succeeded"
                );
            }
            Err(e) if e.is_transient() => {
                if pending.queued_at.elapsed() > WRITE_RETRY_WINDOW {
                    return Err(e);
                }
                still_pending.push_back(pending);
            }
            Err(e) => {
                error!(error = %e, "queued violation write rejected, dropping");
            }
        }
    }
    *pending_writes = still_pending;
    Ok(())
}

/// Final best-effort flush during shutdown
async fn flush_pending_writes(deps: &PipelineDeps, pending_writes: &mut VecDeque<PendingWrite>) {
    while let Some(pending) = pending_writes.pop_front() {
        if let Err(e) = deps.violations.store(&pending.record).await {
            warn!(error = %e, "dropping unflushed violation write at shutdown");
        }
    }
}
