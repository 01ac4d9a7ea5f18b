//! The transform model: which asset is displayed and with what geometry.
//!
//! The presenter owns the single authoritative instance. Every mutation
//! produces a fresh [`SceneSnapshot`], so "what changed" is a plain value
//! comparison for the sync channel and the audio cue binder.

use shared::{
    domain::{AssetSource, MapId, SongId},
    protocol::{SceneSnapshot, ZOOM_FLOOR},
};

pub struct TransformModel {
    current: SceneSnapshot,
}

impl TransformModel {
    pub fn new(initial: SceneSnapshot) -> Self {
        Self { current: initial }
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        self.current.clone()
    }

    pub fn has_asset(&self) -> bool {
        self.current.map_id.is_some()
    }

    /// Replaces the displayed asset. Geometry is preserved exactly: a user's
    /// framing carries over when flipping between variants of a scene, until
    /// they reset it explicitly.
    pub fn set_asset(
        &mut self,
        map_id: MapId,
        source: Option<AssetSource>,
        audio_cue: Option<SongId>,
    ) -> SceneSnapshot {
        self.current.map_id = Some(map_id);
        self.current.source = source;
        self.current.audio_cue = audio_cue;
        self.snapshot()
    }

    /// Adds `delta` to the zoom, clamped to [`ZOOM_FLOOR`]. Non-finite input
    /// or a non-finite result leaves the prior value in place; geometry
    /// updates originate from internal computation, so a bad value is a
    /// silent no-op rather than an error surfaced to the UI.
    pub fn apply_zoom_delta(&mut self, delta: f64) -> SceneSnapshot {
        if delta.is_finite() {
            let next = self.current.zoom + delta;
            if next.is_finite() {
                self.current.zoom = next.max(ZOOM_FLOOR);
            }
        }
        self.snapshot()
    }

    /// Adds `delta_degrees` and normalizes into `[0, 360)`. Values restored
    /// from persisted state are accepted as-is; normalization happens only
    /// when a rotation step is applied.
    pub fn apply_rotation_delta(&mut self, delta_degrees: i32) -> SceneSnapshot {
        self.current.rotation = self
            .current
            .rotation
            .wrapping_add(delta_degrees)
            .rem_euclid(360);
        self.snapshot()
    }

    /// Sets the absolute pan offset in presenter-preview pixel space.
    /// Non-finite components are rejected, retaining the prior values.
    pub fn set_pan(&mut self, x: f64, y: f64) -> SceneSnapshot {
        if x.is_finite() && y.is_finite() {
            self.current.pan_x = x;
            self.current.pan_y = y;
        }
        self.snapshot()
    }

    pub fn reset_geometry(&mut self) -> SceneSnapshot {
        self.current.zoom = 1.0;
        self.current.rotation = 0;
        self.current.pan_x = 0.0;
        self.current.pan_y = 0.0;
        self.snapshot()
    }
}

impl Default for TransformModel {
    fn default() -> Self {
        Self::new(SceneSnapshot::default())
    }
}
