//! Persistence seam for the presentation snapshot.

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::protocol::SceneSnapshot;
use storage::Storage;
use tracing::warn;

/// Durable store for the single "current presentation state" record.
/// `save` overwrites wholesale; concurrent saves are last-write-wins.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &SceneSnapshot) -> Result<()>;

    /// The last saved snapshot, or `None` when nothing was saved yet.
    /// Corrupt stored data is treated as absent, never as a fatal error.
    async fn load(&self) -> Result<Option<SceneSnapshot>>;
}

/// Store for ephemeral sessions and tests: saves vanish, loads find nothing.
pub struct NullSnapshotStore;

#[async_trait]
impl SnapshotStore for NullSnapshotStore {
    async fn save(&self, _snapshot: &SceneSnapshot) -> Result<()> {
        Ok(())
    }

    async fn load(&self) -> Result<Option<SceneSnapshot>> {
        Ok(None)
    }
}

/// Snapshot store backed by the SQLite presentation-state record.
pub struct DurableSnapshotStore {
    storage: Storage,
}

impl DurableSnapshotStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SnapshotStore for DurableSnapshotStore {
    async fn save(&self, snapshot: &SceneSnapshot) -> Result<()> {
        let json =
            serde_json::to_string(snapshot).context("failed to encode presentation snapshot")?;
        self.storage.save_presentation_state(&json).await
    }

    async fn load(&self) -> Result<Option<SceneSnapshot>> {
        let Some(json) = self.storage.load_presentation_state().await? else {
            return Ok(None);
        };

        match serde_json::from_str::<SceneSnapshot>(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                warn!(%error, "stored presentation snapshot is unreadable; starting from defaults");
                Ok(None)
            }
        }
    }
}
