//! Player events and lifecycle hooks
//!
//! Two outward surfaces:
//! - Hooks: one on-play and one on-error callback, last registration wins,
//!   called synchronously once the player has released its state lock.
//! - Events: [`PlayerEvent`]s on a bounded channel for UI synchronization.
//!   Publishing never blocks; events are dropped when nobody keeps up.

use crate::error::PlayerError;
use crate::types::{PlaybackState, TrackContext};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// A context was handed to the engine
    TrackStarted {
        context_id: String,
        title: String,
        start_ms: u64,
    },

    /// The engine reported the end of the current track
    TrackEnded {
        context_id: Option<String>,
        reason: crate::types::EndReason,
    },

    /// A context was appended to the history
    HistoryRecorded { context_id: String },

    /// Derived playback state changed
    StateChanged { state: PlaybackState },

    /// Volume changed (engine percent)
    VolumeChanged { percent: u32 },

    /// User-facing error
    Error { message: String },
}

pub(crate) type PlayHook = Arc<dyn Fn(&Arc<TrackContext>) + Send + Sync>;
pub(crate) type ErrorHook = Arc<dyn Fn(&PlayerError) + Send + Sync>;

/// Single-slot hook storage
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) on_play: Option<PlayHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

/// Sending half of the event channel
pub(crate) struct EventBus {
    tx: Sender<PlayerEvent>,
    rx: Receiver<PlayerEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Receiver sharing the channel; every event goes to exactly one receiver
    pub(crate) fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.rx.clone()
    }

    pub(crate) fn publish(&self, event: PlayerEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::trace!("Event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
