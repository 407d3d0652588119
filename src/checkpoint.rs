//! Checkpoint store — durable, resumable snapshots keyed by thread id.
//!
//! A checkpoint is the full conversation state plus the point to resume
//! from. Saves supersede: only the latest checkpoint per thread matters,
//! and `load` returns exactly that. Persistence failures are fatal to the
//! turn — resumability cannot be promised after a failed write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{ConciergeError, ConciergeResult};
use crate::interrupt::PendingBatch;
use crate::state::ConversationState;

/// Where execution picks up when the thread is next driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resume", rename_all = "snake_case")]
pub enum ResumePoint {
    /// Turn boundary: waiting for the next user message.
    NextUserMessage,
    /// Suspended at the interrupt gate with a sensitive batch parked.
    PendingApproval { batch: PendingBatch },
}

/// Durable snapshot of one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: ConversationState,
    pub resume_point: ResumePoint,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        state: ConversationState,
        resume_point: ResumePoint,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            state,
            resume_point,
            created_at: Utc::now(),
        }
    }

    pub fn is_awaiting_approval(&self) -> bool {
        matches!(self.resume_point, ResumePoint::PendingApproval { .. })
    }
}

/// Storage contract: latest-wins save, load-before-resume, per-thread
/// delete for explicit aborts. Implementations must serialize writes for
/// the same thread id; different threads are fully independent.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> ConciergeResult<()>;

    async fn load(&self, thread_id: &str) -> ConciergeResult<Option<Checkpoint>>;

    /// Discard the thread's checkpoint. Missing threads are not an error.
    async fn delete(&self, thread_id: &str) -> ConciergeResult<()>;
}

// ─── Filesystem store ───────────────────────────────────────────────────────

/// One JSON file per thread under a base directory.
pub struct FsCheckpointStore {
    base_dir: PathBuf,
    locks: DashMap<String, std::sync::Arc<tokio::sync::Mutex<()>>>,
}

impl FsCheckpointStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        // thread ids come from the caller; keep them filesystem-safe
        let safe: String = thread_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }

    fn lock_for(&self, thread_id: &str) -> std::sync::Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> ConciergeResult<()> {
        let lock = self.lock_for(&checkpoint.thread_id);
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| ConciergeError::Checkpoint(e.to_string()))?;

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| ConciergeError::Checkpoint(e.to_string()))?;

        // write-then-rename so a crash mid-write never corrupts the
        // latest good checkpoint
        let path = self.thread_path(&checkpoint.thread_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| ConciergeError::Checkpoint(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ConciergeError::Checkpoint(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> ConciergeResult<Option<Checkpoint>> {
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock().await;

        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConciergeError::Checkpoint(e.to_string()))?;
        let checkpoint = serde_json::from_str(&content)
            .map_err(|e| ConciergeError::Checkpoint(e.to_string()))?;
        Ok(Some(checkpoint))
    }

    async fn delete(&self, thread_id: &str) -> ConciergeResult<()> {
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock().await;

        let path = self.thread_path(thread_id);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| ConciergeError::Checkpoint(e.to_string()))?;
        }
        Ok(())
    }
}

// ─── In-memory store ────────────────────────────────────────────────────────

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: DashMap<String, Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> ConciergeResult<()> {
        self.entries
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> ConciergeResult<Option<Checkpoint>> {
        Ok(self.entries.get(thread_id).map(|e| e.clone()))
    }

    async fn delete(&self, thread_id: &str) -> ConciergeResult<()> {
        self.entries.remove(thread_id);
        Ok(())
    }
}
