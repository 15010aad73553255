//! End-of-range handling for split contexts

use crate::player::Player;
use crate::types::TrackContext;
use std::sync::Arc;

/// Called when a split context reaches `start + duration`
///
/// Runs outside the player's state lock, so implementations may issue
/// player commands.
pub trait TrackEndMarkerHandler: Send + Sync {
    fn on_marker_reached(&self, player: &Player, context: &Arc<TrackContext>);
}

/// Skips to the next track once the bounded range has played
///
/// Does nothing if another context became current in the meantime.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipAtMarker;

impl TrackEndMarkerHandler for SkipAtMarker {
    fn on_marker_reached(&self, player: &Player, context: &Arc<TrackContext>) {
        if player.skip_context(context) {
            tracing::info!(
                "Stopped {} because its end marker was reached",
                context.effective_title()
            );
        }
    }
}
