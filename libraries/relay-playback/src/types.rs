//! Core types for the playback controller

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Duration of one audio frame handed to the transport
pub const FRAME_DURATION_MS: u64 = 20;

/// Decodable track handle as the engine sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Engine-level identifier (URL, file path, ...)
    pub identifier: String,

    /// Title reported by the source
    pub title: String,

    /// Full length of the track in milliseconds
    pub length_ms: u64,

    /// Live streams have no fixed length and cannot seek
    #[serde(default)]
    pub is_stream: bool,
}

impl AudioTrack {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, length_ms: u64) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            length_ms,
            is_stream: false,
        }
    }

    /// Create a live stream handle
    pub fn stream(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            length_ms: u64::MAX,
            is_stream: true,
        }
    }

    pub fn is_seekable(&self) -> bool {
        !self.is_stream
    }
}

/// Bounded sub-range of a track ("split" context)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackBound {
    /// Offset into the track where playback starts
    pub start_ms: u64,

    /// How long to play from `start_ms`
    pub duration_ms: u64,
}

/// One playable unit: a track plus the bounds it should play within
///
/// Always shared as `Arc<TrackContext>`; immutable after creation so the
/// history can keep references to contexts that finished long ago.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackContext {
    /// Unique id of this context (the same track may be queued twice)
    pub id: String,

    /// Underlying decodable track
    pub track: Arc<AudioTrack>,

    /// Display title
    pub title: String,

    /// Sub-range to play, `None` for the whole track
    pub bound: Option<TrackBound>,
}

impl TrackContext {
    /// Context playing the whole track, titled after the track
    pub fn new(id: impl Into<String>, track: Arc<AudioTrack>) -> Self {
        let title = track.title.clone();
        Self {
            id: id.into(),
            track,
            title,
            bound: None,
        }
    }

    /// Context playing `duration_ms` of the track starting at `start_ms`
    pub fn split(
        id: impl Into<String>,
        track: Arc<AudioTrack>,
        title: impl Into<String>,
        start_ms: u64,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            track,
            title: title.into(),
            bound: Some(TrackBound {
                start_ms,
                duration_ms,
            }),
        }
    }

    pub fn effective_title(&self) -> &str {
        &self.title
    }

    pub fn start_position_ms(&self) -> u64 {
        self.bound.map_or(0, |b| b.start_ms)
    }

    pub fn effective_duration_ms(&self) -> u64 {
        self.bound.map_or(self.track.length_ms, |b| b.duration_ms)
    }

    pub fn is_split(&self) -> bool {
        self.bound.is_some()
    }

    /// Position at which a split context must be cut off
    pub fn end_marker_ms(&self) -> Option<u64> {
        self.bound
            .map(|b| b.start_ms.saturating_add(b.duration_ms))
    }
}

/// One encoded audio frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Encoded payload (opus)
    pub data: Vec<u8>,

    /// Position of this frame in the track
    pub timecode_ms: u64,
}

/// Why the engine stopped playing a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Reached the end naturally
    Finished,

    /// Stopped by a `stop_track` call
    Stopped,

    /// Engine discarded the track during cleanup (idle player)
    Cleanup,

    /// Track could not be loaded or decoded from the start
    LoadFailed,

    /// Another track was started in its place without a stop
    Replaced,
}

impl EndReason {
    /// Whether the engine considers starting the next track appropriate
    pub fn may_start_next(self) -> bool {
        matches!(self, EndReason::Finished | EndReason::LoadFailed)
    }
}

/// Playback state derived from the current context and the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No context, engine has no track
    Idle,

    /// Context set, engine playing
    Playing,

    /// Context set, engine paused
    Paused,
}

/// Configuration for the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Maximum history size (default: 20)
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Volume applied when the player is created (default: 1.0)
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Capacity of the event channel (default: 32)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_history_size() -> usize {
    20
}

fn default_initial_volume() -> f32 {
    1.0
}

fn default_event_capacity() -> usize {
    32
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            initial_volume: default_initial_volume(),
            event_capacity: default_event_capacity(),
        }
    }
}
