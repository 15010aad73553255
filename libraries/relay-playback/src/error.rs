//! Error types for the playback controller

use thiserror::Error;

/// Player errors
///
/// Variants marked user-facing carry a message meant for the person who
/// issued the command (see [`PlayerError::is_user_facing`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    /// A command needed a current track and there was none
    #[error("Nothing is playing right now")]
    NoTrackPlaying,

    /// Seek requested on a track that cannot seek (live streams)
    #[error("Cannot seek in `{title}`: it is a live stream")]
    SeekNotSupported {
        /// Effective title of the current context
        title: String,
    },

    /// The engine could not load a track
    #[error("Track `{title}` failed to load. Skipping...")]
    TrackLoadFailed {
        /// Title reported by the engine for the failed track
        title: String,
    },

    /// Volume outside the accepted range
    #[error("Invalid volume: {0}. Must be a finite value of at least 0.0")]
    InvalidVolume(f32),

    /// The player was destroyed and no longer accepts commands
    #[error("Player has been destroyed")]
    Destroyed,
}

impl PlayerError {
    /// Whether this error is meant to be shown to the end user as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            PlayerError::NoTrackPlaying
                | PlayerError::SeekNotSupported { .. }
                | PlayerError::TrackLoadFailed { .. }
                | PlayerError::InvalidVolume(_)
        )
    }
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;
