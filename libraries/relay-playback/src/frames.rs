//! Frame supply for the audio transport
//!
//! The transport pulls one frame every 20ms. Pulling and handing over are a
//! single call, so there is no cached frame that could be read before it was
//! filled.

use crate::player::Player;
use crate::types::AudioFrame;

/// Transport-facing frame source
pub trait FrameSupplier: Send + Sync {
    /// Next frame to send, `None` if nothing is buffered this cycle
    fn poll_frame(&self) -> Option<AudioFrame>;

    /// Frames are already opus-encoded
    fn is_opus(&self) -> bool {
        true
    }
}

impl FrameSupplier for Player {
    fn poll_frame(&self) -> Option<AudioFrame> {
        let frame = self.engine().provide_frame();

        let mut counter = self.loss_counter.lock();
        if frame.is_some() {
            counter.on_success();
        } else {
            counter.on_loss();
        }

        frame
    }
}
