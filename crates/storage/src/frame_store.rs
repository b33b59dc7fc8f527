//! Filesystem frame store
//!
//! Writes annotated violation frames and their JSON evidence sidecars under
//! a per-session directory:
//!
//! ```text
//! violation_frames/
//!   <session_id>/
//!     violation_<frame_id>_<yyyymmdd_hhmmss_mmm>.jpg
//!     violation_<frame_id>_<yyyymmdd_hhmmss_mmm>.jpg.json
//! ```

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where an annotated frame ended up
#[derive(Debug, Clone)]
pub struct StoredFrame {
    pub frame_path: PathBuf,
    pub sidecar_path: PathBuf,
}

/// Storage adapter for annotated violation frames
#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Persist one annotated frame and its evidence sidecar
    async fn write_frame(
        &self,
        session_id: &str,
        frame_id: &str,
        timestamp: DateTime<Utc>,
        jpeg_bytes: &[u8],
        sidecar: &serde_json::Value,
    ) -> StorageResult<StoredFrame>;
}

/// Frame store writing to the local filesystem
pub struct FilesystemFrameStore {
    base_path: PathBuf,
}

impl FilesystemFrameStore {
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        info!(path = %base_path.display(), "frame store initialized");
        Self { base_path }
    }

    /// Base path from the `VIOLATION_FRAMES_PATH` env var, defaulting to
    /// `violation_frames`
    #[must_use]
    pub fn from_env() -> Self {
        let base = std::env::var("VIOLATION_FRAMES_PATH")
            .unwrap_or_else(|_| "violation_frames".to_string());
        Self::new(base)
    }

    fn frame_filename(frame_id: &str, timestamp: DateTime<Utc>) -> String {
        // Millisecond-resolution suffix keeps repeated frame ids distinct
        let stamp = timestamp.format("%Y%m%d_%H%M%S_%3f");
        format!("violation_{frame_id}_{stamp}.jpg")
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_path.join(sanitize_component(session_id))
    }
}

/// Keep path components free of separators and traversal
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

#[async_trait]
impl FrameStore for FilesystemFrameStore {
    async fn write_frame(
        &self,
        session_id: &str,
        frame_id: &str,
        timestamp: DateTime<Utc>,
        jpeg_bytes: &[u8],
        sidecar: &serde_json::Value,
    ) -> StorageResult<StoredFrame> {
        let session_dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&session_dir).await?;

        let filename = Self::frame_filename(&sanitize_component(frame_id), timestamp);
        let frame_path = session_dir.join(&filename);
        let sidecar_path = session_dir.join(format!("{filename}.json"));

        tokio::fs::write(&frame_path, jpeg_bytes).await?;
        tokio::fs::write(&sidecar_path, serde_json::to_vec_pretty(sidecar)?).await?;

        debug!(path = %frame_path.display(), bytes = jpeg_bytes.len(), "violation frame written");
        Ok(StoredFrame {
            frame_path,
            sidecar_path,
        })
    }
}

impl FilesystemFrameStore {
    /// Remove violation frames older than `max_age_days`, pruning empty
    /// session directories along the way
    pub async fn cleanup_old_frames(&self, max_age_days: u64) -> StorageResult<usize> {
        let cutoff = std::time::SystemTime::now()
            - std::time::Duration::from_secs(max_age_days * 24 * 3600);
        let mut removed = 0;

        let mut sessions = match tokio::fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(session) = sessions.next_entry().await? {
            if !session.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(session.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "jpg")
                    && entry.metadata().await?.modified()? < cutoff
                {
                    tokio::fs::remove_file(&path).await?;
                    let sidecar = sidecar_of(&path);
                    if tokio::fs::try_exists(&sidecar).await? {
                        tokio::fs::remove_file(&sidecar).await?;
                    }
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(removed, "cleaned up old violation frames");
        }
        Ok(removed)
    }
}

fn sidecar_of(frame_path: &Path) -> PathBuf {
    let mut os = frame_path.as_os_str().to_owned();
    os.push(".json");
    PathBuf::from(os)
}
