//! Audio cue binding: asset transitions can switch the background track.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::{domain::SongId, protocol::SceneSnapshot};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::warn;

/// External audio player. `switch_track` stops whatever is playing and
/// starts the given track, looped; playback internals are not this crate's
/// concern.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn switch_track(&self, cue: SongId) -> Result<()>;
}

/// Fallback player for sessions without an audio backend.
pub struct NoopAudioPlayer;

#[async_trait]
impl AudioPlayer for NoopAudioPlayer {
    async fn switch_track(&self, _cue: SongId) -> Result<()> {
        Ok(())
    }
}

/// Watches snapshots flowing through the sync channel and switches the
/// track when the audio cue actually changes. A snapshot without a cue
/// leaves playback alone: a transient selection of a cue-less asset must
/// not cause a surprising silence.
pub struct AudioCueBinder {
    player: Arc<dyn AudioPlayer>,
    last_cue: Mutex<Option<SongId>>,
}

impl AudioCueBinder {
    /// `initial_cue` seeds the comparison state, so bootstrapping the
    /// channel from a restored snapshot does not restart playback.
    pub fn new(player: Arc<dyn AudioPlayer>, initial_cue: Option<SongId>) -> Arc<Self> {
        Arc::new(Self {
            player,
            last_cue: Mutex::new(initial_cue),
        })
    }

    pub async fn observe(&self, snapshot: &SceneSnapshot) {
        let Some(cue) = snapshot.audio_cue else {
            return;
        };

        {
            let mut last = self.last_cue.lock().await;
            if *last == Some(cue) {
                return;
            }
            *last = Some(cue);
        }

        if let Err(error) = self.player.switch_track(cue).await {
            warn!(cue = cue.0, %error, "audio track switch failed");
        }
    }

    /// Consumes the snapshot stream until the channel closes. Lagged
    /// deliveries are skipped; the next received snapshot carries the
    /// current cue anyway.
    pub fn spawn(
        self: &Arc<Self>,
        mut snapshots: broadcast::Receiver<SceneSnapshot>,
    ) -> JoinHandle<()> {
        let binder = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match snapshots.recv().await {
                    Ok(snapshot) => binder.observe(&snapshot).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "audio cue binder lagged behind snapshot stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
