//! Decode engine contract
//!
//! The engine decodes tracks, buffers encoded frames and reports track
//! lifecycle events from its own thread. The player drives it through
//! [`DecodeEngine`] and listens through [`EngineListener`].

use crate::types::{AudioFrame, AudioTrack, EndReason};
use std::sync::Arc;

/// Identifies one started track
///
/// Handed to the engine with every [`PlayRequest`] and echoed back on every
/// [`EngineEvent`]. The player ignores events whose token is not the one it
/// issued last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackToken(pub u64);

/// Handle returned by [`DecodeEngine::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Instruction to start a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub token: PlaybackToken,
    pub track: Arc<AudioTrack>,

    /// Decoded position to start from
    pub start_ms: u64,

    /// Position at which the engine must emit [`EngineEvent::MarkerReached`]
    pub end_marker_ms: Option<u64>,
}

/// Notifications pushed by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The track stopped playing
    TrackEnd {
        token: PlaybackToken,
        track: Arc<AudioTrack>,
        reason: EndReason,
    },

    /// Decoding failed mid-track; the engine may still emit `TrackEnd` later
    TrackException {
        token: PlaybackToken,
        track: Arc<AudioTrack>,
        message: String,
    },

    /// No frames were produced for longer than `threshold_ms`
    TrackStuck {
        token: PlaybackToken,
        track: Arc<AudioTrack>,
        threshold_ms: u64,
    },

    /// Playback passed the `end_marker_ms` of the request
    MarkerReached {
        token: PlaybackToken,
        position_ms: u64,
    },
}

impl EngineEvent {
    pub fn token(&self) -> PlaybackToken {
        match self {
            EngineEvent::TrackEnd { token, .. }
            | EngineEvent::TrackException { token, .. }
            | EngineEvent::TrackStuck { token, .. }
            | EngineEvent::MarkerReached { token, .. } => *token,
        }
    }
}

/// Receives engine notifications
///
/// Called from the engine's thread, possibly from inside a [`DecodeEngine`]
/// call made by the player itself.
pub trait EngineListener: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

/// Platform decode/transport engine
///
/// Implementations must be internally synchronized: the player calls from
/// command threads while the transport pulls frames from another thread.
pub trait DecodeEngine: Send + Sync {
    /// Start a track, replacing whatever is playing
    fn play_track(&self, request: PlayRequest);

    /// Stop the current track
    ///
    /// Engines report this with `TrackEnd { reason: Stopped }`.
    fn stop_track(&self);

    fn set_paused(&self, paused: bool);

    fn is_paused(&self) -> bool;

    /// Track currently loaded in the engine
    fn playing_track(&self) -> Option<Arc<AudioTrack>>;

    /// Current decoded position of the playing track
    fn position_ms(&self) -> u64;

    fn seek_to(&self, position_ms: u64);

    /// Set volume in percent (100 = unity)
    fn set_volume(&self, percent: u32);

    fn volume(&self) -> u32;

    /// Next encoded frame, `None` when nothing is buffered
    fn provide_frame(&self) -> Option<AudioFrame>;

    fn add_listener(&self, listener: Arc<dyn EngineListener>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Release any remote connection backing this engine
    ///
    /// Local engines have nothing to release.
    fn release(&self) {}
}
