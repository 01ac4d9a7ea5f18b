//! Audience-side surface state: applies snapshots from the channel and
//! reports its rendering area back. The audience never originates snapshot
//! changes.

use std::sync::Arc;

use shared::protocol::{SceneSnapshot, ViewportReport};
use tokio::sync::broadcast;
use tracing::warn;

use crate::channel::SyncChannel;

pub struct AudienceSurface {
    channel: Arc<SyncChannel>,
    snapshots: broadcast::Receiver<SceneSnapshot>,
    current: Option<SceneSnapshot>,
}

impl AudienceSurface {
    /// Attaches to the channel. The current snapshot, if any, is applied
    /// immediately; a surface opened mid-session starts in sync.
    pub fn attach(channel: &Arc<SyncChannel>) -> Self {
        let (latest, snapshots) = channel.attach_audience();
        Self {
            channel: Arc::clone(channel),
            snapshots,
            current: latest,
        }
    }

    pub fn current(&self) -> Option<&SceneSnapshot> {
        self.current.as_ref()
    }

    /// Waits for the next snapshot that differs from the applied state.
    /// Re-deliveries of the same logical value are absorbed here, so the
    /// renderer only redraws on real changes. Returns `None` once the
    /// presenter side is gone.
    pub async fn next_change(&mut self) -> Option<SceneSnapshot> {
        loop {
            match self.snapshots.recv().await {
                Ok(snapshot) => {
                    if self.current.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    self.current = Some(snapshot.clone());
                    return Some(snapshot);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "audience surface lagged behind snapshot stream");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Reports the surface's rendering area. Called on every resize; the
    /// frame-fit compositor on the presenter side filters degenerate values.
    pub fn resize(&self, width: u32, height: u32) {
        self.channel
            .report_viewport(ViewportReport::new(width, height));
    }
}
