//! Relay Player - Session Playback
//!
//! Per-session playback controller for Relay Player.
//!
//! This crate provides:
//! - The [`Player`] state machine (play, pause, skip, stop, seek, volume)
//! - Reactions to asynchronous end-of-track notifications
//! - Bounded recently-played history (20 entries by default)
//! - Split contexts that play a sub-range of a track
//! - Frame supply with loss accounting for health reporting
//!
//! # Architecture
//!
//! `relay-playback` sits between two collaborators it does not implement:
//! - a [`TrackProvider`] that decides what plays next
//! - a [`DecodeEngine`] that decodes, buffers frames and reports track ends
//!
//! Both are traits. [`QueueProvider`] is a plain FIFO provider.
//!
//! # Example
//!
//! ```rust,no_run
//! use relay_playback::{
//!     AudioTrack, DecodeEngine, Player, PlayerConfig, QueueProvider, TrackContext,
//! };
//! use std::sync::Arc;
//!
//! # fn engine() -> Arc<dyn DecodeEngine> { unimplemented!() }
//! let player = Player::new(engine(), PlayerConfig::default());
//!
//! let queue = Arc::new(QueueProvider::new());
//! let track = Arc::new(AudioTrack::new("https://example.org/a.opus", "Song A", 5_000));
//! queue.add(Arc::new(TrackContext::new("ctx-a", track)));
//! player.set_track_provider(queue);
//!
//! player.set_on_play_hook(|context| println!("Now playing {}", context.effective_title()));
//! player.play();
//! ```

mod engine;
mod error;
mod events;
mod frames;
mod history;
mod loss;
mod marker;
mod player;
mod provider;
pub mod types;

// Public exports
pub use engine::{
    DecodeEngine, EngineEvent, EngineListener, ListenerId, PlayRequest, PlaybackToken,
};
pub use error::{PlayerError, Result};
pub use events::PlayerEvent;
pub use frames::FrameSupplier;
pub use history::{History, DEFAULT_HISTORY_SIZE};
pub use loss::{AudioLossCounter, LossReport, EXPECTED_FRAMES_PER_MINUTE};
pub use marker::{SkipAtMarker, TrackEndMarkerHandler};
pub use player::Player;
pub use provider::{QueueProvider, TrackProvider};
pub use types::{
    AudioFrame, AudioTrack, EndReason, PlaybackState, PlayerConfig, TrackBound, TrackContext,
    FRAME_DURATION_MS,
};
