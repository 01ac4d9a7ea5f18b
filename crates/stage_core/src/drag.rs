//! Pointer-drag handling for the presenter preview.
//!
//! Two pieces: [`DragController`] is the Idle/Dragging state machine that
//! turns pointer events into pan values, and [`Debouncer`] is the cancellable
//! deferred publish with an explicit flush. Local rendering follows every
//! pointer move synchronously; only the remote publish is rate-limited.

use std::sync::Arc;
use std::time::Duration;

use shared::protocol::SceneSnapshot;
use tokio::{
    sync::mpsc,
    time::{sleep, Instant},
};

use crate::channel::SyncChannel;

enum DragState {
    Idle,
    Dragging {
        start_x: f64,
        start_y: f64,
        pan_start_x: f64,
        pan_start_y: f64,
    },
}

/// State machine for a pointer drag over the displayed asset.
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Enters `Dragging`, recording the pointer origin and the pan value at
    /// drag start.
    pub fn pointer_down(&mut self, x: f64, y: f64, pan_x: f64, pan_y: f64) {
        self.state = DragState::Dragging {
            start_x: x,
            start_y: y,
            pan_start_x: pan_x,
            pan_start_y: pan_y,
        };
    }

    /// Returns the new pan for this pointer position, or `None` when no drag
    /// is in progress.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging {
                start_x,
                start_y,
                pan_start_x,
                pan_start_y,
            } => Some((pan_start_x + (x - start_x), pan_start_y + (y - start_y))),
        }
    }

    /// Ends the drag (pointer-up, or pointer-leave acting as an implicit
    /// pointer-up). Returns whether a drag was actually in progress.
    pub fn release(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.state = DragState::Idle;
        was_dragging
    }
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

enum DebounceCommand {
    Schedule(SceneSnapshot),
    Flush,
}

/// Trailing-edge debounced publisher: `schedule` replaces any pending
/// snapshot and re-arms the timer, so at most one publish fires per window
/// during continuous motion; `flush` emits the pending snapshot immediately.
/// Dropping the handle flushes too, so no update is ever permanently lost.
pub struct Debouncer {
    tx: mpsc::UnboundedSender<DebounceCommand>,
}

impl Debouncer {
    pub fn spawn(window: Duration, channel: Arc<SyncChannel>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut pending: Option<SceneSnapshot> = None;
            let timer = sleep(window);
            tokio::pin!(timer);
            loop {
                tokio::select! {
                    command = rx.recv() => match command {
                        Some(DebounceCommand::Schedule(snapshot)) => {
                            pending = Some(snapshot);
                            timer.as_mut().reset(Instant::now() + window);
                        }
                        Some(DebounceCommand::Flush) => {
                            if let Some(snapshot) = pending.take() {
                                channel.publish(snapshot);
                            }
                        }
                        None => {
                            if let Some(snapshot) = pending.take() {
                                channel.publish(snapshot);
                            }
                            break;
                        }
                    },
                    () = timer.as_mut(), if pending.is_some() => {
                        if let Some(snapshot) = pending.take() {
                            channel.publish(snapshot);
                        }
                    }
                }
            }
        });
        Self { tx }
    }

    /// Replaces the pending snapshot and restarts the debounce window.
    pub fn schedule(&self, snapshot: SceneSnapshot) {
        let _ = self.tx.send(DebounceCommand::Schedule(snapshot));
    }

    /// Publishes the pending snapshot now, if there is one. Invoked on
    /// drag-end so the audience always lands on the exact final pan value.
    pub fn flush(&self) {
        let _ = self.tx.send(DebounceCommand::Flush);
    }
}
