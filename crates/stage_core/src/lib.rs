//! Live presentation synchronization engine: the presenter-owned transform
//! model, the presenter/audience sync channel, drag handling with debounced
//! publishing, the frame-fit preview compositor, and the audio cue binder.

use std::time::Duration;

pub mod audience;
pub mod audio;
pub mod catalog;
pub mod channel;
pub mod compositor;
pub mod drag;
pub mod persist;
pub mod presenter;
pub mod transform;
pub mod transport;

pub use audience::AudienceSurface;
pub use audio::{AudioCueBinder, AudioPlayer, NoopAudioPlayer};
pub use catalog::CatalogClient;
pub use channel::SyncChannel;
pub use compositor::{FrameFit, FrameFitCompositor, PaneSize};
pub use drag::{Debouncer, DragController};
pub use persist::{DurableSnapshotStore, NullSnapshotStore, SnapshotStore};
pub use presenter::{PanDirection, PresenterSession};
pub use transform::TransformModel;
pub use transport::{connect_audience, connect_presenter, TransportHandle, TransportRole};

/// Trailing window for pan publishes during a drag. Local rendering is
/// updated on every pointer move regardless; only the remote publish is
/// rate-limited.
pub const DRAG_PUBLISH_DEBOUNCE: Duration = Duration::from_millis(30);

pub const ZOOM_STEP: f64 = 0.1;
pub const ROTATE_STEP_DEGREES: i32 = 90;
pub const PAN_STEP: f64 = 20.0;

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
