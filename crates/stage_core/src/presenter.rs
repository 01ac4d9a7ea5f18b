//! The presenter session: the single authoritative owner of the transform
//! model. Discrete commands publish immediately; drag motion renders locally
//! on every pointer move and publishes through the debouncer, flushed on
//! drag end. Settled states are persisted off the interactive path.

use std::sync::Arc;

use shared::{
    domain::{AssetSource, MapId, SongId},
    protocol::{SceneSnapshot, TransformUpdate},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    audio::{AudioCueBinder, AudioPlayer},
    catalog::CatalogClient,
    channel::SyncChannel,
    drag::{Debouncer, DragController},
    persist::SnapshotStore,
    transform::TransformModel,
    DRAG_PUBLISH_DEBOUNCE, PAN_STEP, ROTATE_STEP_DEGREES, ZOOM_STEP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Up,
    Down,
    Left,
    Right,
}

struct PresenterState {
    model: TransformModel,
    drag: DragController,
}

pub struct PresenterSession {
    channel: Arc<SyncChannel>,
    store: Arc<dyn SnapshotStore>,
    catalog: Option<Arc<CatalogClient>>,
    inner: Mutex<PresenterState>,
    debouncer: Debouncer,
}

impl PresenterSession {
    /// Bootstraps a session from the persisted snapshot (defaults when the
    /// store is empty or unreadable) and publishes the restored state so an
    /// already-attached audience resynchronizes without user action.
    pub async fn restore(
        channel: Arc<SyncChannel>,
        store: Arc<dyn SnapshotStore>,
        player: Arc<dyn AudioPlayer>,
    ) -> Arc<Self> {
        Self::restore_with_catalog(channel, store, player, None).await
    }

    pub async fn restore_with_catalog(
        channel: Arc<SyncChannel>,
        store: Arc<dyn SnapshotStore>,
        player: Arc<dyn AudioPlayer>,
        catalog: Option<Arc<CatalogClient>>,
    ) -> Arc<Self> {
        let restored = match store.load().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "failed to load persisted presentation state; starting from defaults");
                None
            }
        };

        let initial = restored.clone().unwrap_or_default();

        // The binder is seeded with the restored cue: bootstrapping the
        // channel must not restart playback.
        let binder = AudioCueBinder::new(player, initial.audio_cue);
        binder.spawn(channel.subscribe_snapshots());

        let session = Arc::new(Self {
            debouncer: Debouncer::spawn(DRAG_PUBLISH_DEBOUNCE, Arc::clone(&channel)),
            channel,
            store,
            catalog,
            inner: Mutex::new(PresenterState {
                model: TransformModel::new(initial),
                drag: DragController::new(),
            }),
        });

        if let Some(snapshot) = restored {
            info!(
                map_id = snapshot.map_id.map(|id| id.0),
                "restored presentation state"
            );
            session.channel.publish(snapshot);
        }

        session
    }

    pub async fn current_snapshot(&self) -> SceneSnapshot {
        self.inner.lock().await.model.snapshot()
    }

    /// Displays an asset. Geometry is preserved across the switch; the
    /// audio cue binder picks up cue changes from the published snapshot.
    pub async fn select_map(
        &self,
        map_id: MapId,
        source: Option<AssetSource>,
        audio_cue: Option<SongId>,
    ) -> SceneSnapshot {
        let snapshot = {
            let mut state = self.inner.lock().await;
            state.model.set_asset(map_id, source, audio_cue)
        };
        info!(map_id = map_id.0, "map selected for presentation");
        self.publish_settled(snapshot.clone());
        snapshot
    }

    pub async fn zoom_in(&self) -> SceneSnapshot {
        self.zoom_by(ZOOM_STEP).await
    }

    pub async fn zoom_out(&self) -> SceneSnapshot {
        self.zoom_by(-ZOOM_STEP).await
    }

    pub async fn zoom_by(&self, delta: f64) -> SceneSnapshot {
        let snapshot = {
            let mut state = self.inner.lock().await;
            state.model.apply_zoom_delta(delta)
        };
        self.publish_settled(snapshot.clone());
        snapshot
    }

    pub async fn rotate_left(&self) -> SceneSnapshot {
        self.rotate_by(-ROTATE_STEP_DEGREES).await
    }

    pub async fn rotate_right(&self) -> SceneSnapshot {
        self.rotate_by(ROTATE_STEP_DEGREES).await
    }

    pub async fn rotate_by(&self, delta_degrees: i32) -> SceneSnapshot {
        let snapshot = {
            let mut state = self.inner.lock().await;
            state.model.apply_rotation_delta(delta_degrees)
        };
        self.publish_settled(snapshot.clone());
        snapshot
    }

    pub async fn pan_to(&self, x: f64, y: f64) -> SceneSnapshot {
        let snapshot = {
            let mut state = self.inner.lock().await;
            state.model.set_pan(x, y)
        };
        self.publish_settled(snapshot.clone());
        snapshot
    }

    pub async fn nudge_pan(&self, direction: PanDirection) -> SceneSnapshot {
        let snapshot = {
            let mut state = self.inner.lock().await;
            let current = state.model.snapshot();
            let (x, y) = match direction {
                PanDirection::Up => (current.pan_x, current.pan_y - PAN_STEP),
                PanDirection::Down => (current.pan_x, current.pan_y + PAN_STEP),
                PanDirection::Left => (current.pan_x - PAN_STEP, current.pan_y),
                PanDirection::Right => (current.pan_x + PAN_STEP, current.pan_y),
            };
            state.model.set_pan(x, y)
        };
        self.publish_settled(snapshot.clone());
        snapshot
    }

    pub async fn reset_geometry(&self) -> SceneSnapshot {
        let snapshot = {
            let mut state = self.inner.lock().await;
            state.model.reset_geometry()
        };
        self.publish_settled(snapshot.clone());
        snapshot
    }

    /// Starts a drag when the pointer lands on the displayed asset. Ignored
    /// while no asset is selected.
    pub async fn pointer_down(&self, x: f64, y: f64) {
        let mut state = self.inner.lock().await;
        if !state.model.has_asset() {
            return;
        }
        let current = state.model.snapshot();
        state.drag.pointer_down(x, y, current.pan_x, current.pan_y);
    }

    /// Applies a pointer move to the local model and schedules a debounced
    /// publish. The returned snapshot is the state the presenter's own view
    /// renders this frame; `None` while no drag is in progress.
    pub async fn pointer_move(&self, x: f64, y: f64) -> Option<SceneSnapshot> {
        let snapshot = {
            let mut state = self.inner.lock().await;
            let (pan_x, pan_y) = state.drag.pointer_move(x, y)?;
            state.model.set_pan(pan_x, pan_y)
        };
        self.debouncer.schedule(snapshot.clone());
        Some(snapshot)
    }

    /// Ends the drag: flushes any pending debounced publish so the audience
    /// lands on the exact final pan value, then persists the settled state.
    pub async fn pointer_up(&self) {
        let settled = {
            let mut state = self.inner.lock().await;
            if !state.drag.release() {
                return;
            }
            state.model.snapshot()
        };
        self.debouncer.flush();
        self.save_detached(settled);
    }

    /// The pointer leaving the interactive region is an implicit pointer-up;
    /// a drag must never survive the cursor escaping the preview.
    pub async fn pointer_leave(&self) {
        self.pointer_up().await;
    }

    /// Publish immediately (discrete commands bypass the debouncer) and
    /// persist off the interactive path.
    fn publish_settled(&self, snapshot: SceneSnapshot) {
        self.channel.publish(snapshot.clone());
        self.save_detached(snapshot);
    }

    fn save_detached(&self, snapshot: SceneSnapshot) {
        let store = Arc::clone(&self.store);
        let catalog = self.catalog.clone();
        tokio::spawn(async move {
            if let Err(error) = store.save(&snapshot).await {
                warn!(%error, "failed to persist presentation state");
            }
            if let (Some(catalog), Some(map_id)) = (catalog, snapshot.map_id) {
                let update = TransformUpdate {
                    zoom: snapshot.zoom,
                    rotation: snapshot.rotation,
                    pan_x: snapshot.pan_x,
                    pan_y: snapshot.pan_y,
                };
                if let Err(error) = catalog.update_map_transform(map_id, &update).await {
                    warn!(map_id = map_id.0, %error, "failed to write settled transform to catalog");
                }
            }
        });
    }
}

