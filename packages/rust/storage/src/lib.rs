//! Snapshot persistence for the story cache.
//!
//! [`SnapshotStore`] reads and writes one JSON file holding a serialized
//! [`CacheSnapshot`]. Both directions are deliberately forgiving: a missing
//! or unparsable file loads as the empty snapshot, and a failed save is
//! logged and swallowed. Persistence failures never abort a request and
//! never touch in-memory cache state — at worst the next run starts cold.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use dailydigest_shared::{CacheSnapshot, DigestError, Result};

/// File-backed store for cache snapshots.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store reading and writing `path`. Nothing is touched on disk
    /// until [`load`](Self::load) or [`save`](Self::save) is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot, or the empty snapshot if the file is
    /// missing or unreadable.
    pub async fn load(&self) -> CacheSnapshot {
        match self.try_load().await {
            Ok(snapshot) => {
                debug!(path = %self.path.display(), digests = snapshot.by_date.len(), "snapshot loaded");
                snapshot
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unable to load snapshot, starting empty");
                CacheSnapshot::default()
            }
        }
    }

    /// Persist a snapshot, best-effort. Failures are logged and swallowed.
    pub async fn save(&self, snapshot: &CacheSnapshot) {
        if let Err(e) = self.try_save(snapshot).await {
            warn!(path = %self.path.display(), error = %e, "unable to save snapshot");
        }
    }

    async fn try_load(&self) -> Result<CacheSnapshot> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(CacheSnapshot::default());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DigestError::Persistence(format!("read {}: {e}", self.path.display())))?;

        serde_json::from_str(&content)
            .map_err(|e| DigestError::Persistence(format!("parse {}: {e}", self.path.display())))
    }

    async fn try_save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DigestError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| DigestError::Persistence(format!("serialize snapshot: {e}")))?;

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| DigestError::io(&self.path, e))?;

        debug!(path = %self.path.display(), digests = snapshot.by_date.len(), "snapshot saved");
        Ok(())
    }
}
