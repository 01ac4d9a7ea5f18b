//! In-process sync channel between the presenter and audience surfaces.
//!
//! Snapshots flow presenter -> audience, viewport reports flow audience ->
//! presenter. Delivery is at-least-once within a running session; a crashed
//! audience gets nothing replayed except the current snapshot, which is
//! handed over on (re)attach.

use shared::protocol::{SceneSnapshot, ViewportReport};
use tokio::sync::{broadcast, watch};

const CHANNEL_CAPACITY: usize = 256;

pub struct SyncChannel {
    snapshots: broadcast::Sender<SceneSnapshot>,
    viewports: broadcast::Sender<ViewportReport>,
    latest: watch::Sender<Option<SceneSnapshot>>,
}

impl SyncChannel {
    pub fn new() -> Self {
        let (snapshots, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (viewports, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (latest, _) = watch::channel(None);
        Self {
            snapshots,
            viewports,
            latest,
        }
    }

    /// Publishes a snapshot to every attached audience. Never blocks and
    /// never fails from the caller's perspective; an absent or vanished
    /// receiver is not the presenter's problem.
    pub fn publish(&self, snapshot: SceneSnapshot) {
        self.latest.send_replace(Some(snapshot.clone()));
        let _ = self.snapshots.send(snapshot);
    }

    pub fn report_viewport(&self, report: ViewportReport) {
        let _ = self.viewports.send(report);
    }

    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<SceneSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_viewports(&self) -> broadcast::Receiver<ViewportReport> {
        self.viewports.subscribe()
    }

    /// Attach (or re-attach) an audience surface: the subscription is opened
    /// first, then the current snapshot is handed over, so a freshly opened
    /// audience is in sync immediately without the presenter replaying
    /// history.
    pub fn attach_audience(
        &self,
    ) -> (Option<SceneSnapshot>, broadcast::Receiver<SceneSnapshot>) {
        let receiver = self.snapshots.subscribe();
        (self.latest_snapshot(), receiver)
    }

    pub fn latest_snapshot(&self) -> Option<SceneSnapshot> {
        self.latest.borrow().clone()
    }
}

impl Default for SyncChannel {
    fn default() -> Self {
        Self::new()
    }
}
