use serde::{Deserialize, Serialize};

use crate::domain::{AssetSource, MapId, SongId};

/// Zoom may never drop below this floor; a lower value renders the asset
/// effectively invisible.
pub const ZOOM_FLOOR: f64 = 0.1;

/// Immutable snapshot of the presentation state: which asset is displayed
/// and with what geometry. The presenter owns the single authoritative
/// instance; every mutation produces a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<MapId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AssetSource>,
    pub zoom: f64,
    pub rotation: i32,
    pub pan_x: f64,
    pub pan_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_cue: Option<SongId>,
}

impl Default for SceneSnapshot {
    fn default() -> Self {
        Self {
            map_id: None,
            source: None,
            zoom: 1.0,
            rotation: 0,
            pan_x: 0.0,
            pan_y: 0.0,
            audio_cue: None,
        }
    }
}

/// Audience rendering area in pixels. Produced on every audience resize,
/// consumed by the frame-fit compositor, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportReport {
    pub width: u32,
    pub height: u32,
}

impl ViewportReport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// The two message types carried between presenter and audience surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StageMessage {
    Snapshot { snapshot: SceneSnapshot },
    Viewport { report: ViewportReport },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSummary {
    pub map_id: MapId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AssetSource>,
    pub zoom: f64,
    pub rotation: i32,
    pub pan_x: f64,
    pub pan_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<SongId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMap {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AssetSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<SongId>,
}

/// Partial update for a catalog map record; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AssetSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<SongId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformUpdate {
    pub zoom: f64,
    pub rotation: i32,
    pub pan_x: f64,
    pub pan_y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongSummary {
    pub song_id: SongId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSong {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub file_path: String,
}
