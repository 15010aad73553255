/// One simulated listening session: player, queue and transport loop
use crate::config::SimConfig;
use crate::engine::SimEngine;
use anyhow::{Context, Result};
use relay_playback::{
    FrameSupplier, LossReport, Player, PlayerError, PlayerEvent, QueueProvider, TrackContext,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct Session {
    player: Arc<Player>,
    queue: Arc<QueueProvider>,
    frame_interval: Duration,
    max_polls: u64,
}

/// What the transport saw during a run
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub polls: u64,
    pub delivered: u64,
    pub tracks_started: u64,
    pub loss: LossReport,
}

impl Session {
    pub fn new(config: &SimConfig) -> Result<Self> {
        let frame_interval = Duration::from_millis(config.frame_interval_ms);
        let engine = SimEngine::new(frame_interval).context("Failed to start decoder thread")?;

        let player = Player::new(engine, config.player.clone());
        let queue = Arc::new(QueueProvider::with_contexts(
            config.tracks.iter().map(|t| t.to_context()),
        ));
        player.set_track_provider(queue.clone());

        player.set_on_error_hook(|error: &PlayerError| {
            println!("! {}", error);
        });

        tracing::info!("Session ready with {} tracks", queue.len());

        Ok(Self {
            player,
            queue,
            frame_interval,
            max_polls: config.max_polls,
        })
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    /// Play the queue to the end, pulling one frame per interval
    ///
    /// With `skip_after_frames`, every track is skipped once that many of
    /// its frames were delivered.
    pub fn run(&self, skip_after_frames: Option<u64>) -> RunSummary {
        let track_frames = Arc::new(AtomicU64::new(0));
        let hook_frames = track_frames.clone();
        self.player
            .set_on_play_hook(move |context: &Arc<TrackContext>| {
                hook_frames.store(0, Ordering::SeqCst);
                println!("> Now playing: {}", context.effective_title());
            });

        let events = self.player.subscribe();
        let mut summary = RunSummary {
            polls: 0,
            delivered: 0,
            tracks_started: 0,
            loss: LossReport::default(),
        };

        self.player.play();

        loop {
            for event in events.try_iter() {
                tracing::debug!("Player event: {:?}", event);
                if matches!(event, PlayerEvent::TrackStarted { .. }) {
                    summary.tracks_started += 1;
                }
            }

            if self.is_drained() {
                break;
            }
            if summary.polls >= self.max_polls {
                tracing::warn!("Giving up after {} polls", summary.polls);
                break;
            }

            thread::sleep(self.frame_interval);
            summary.polls += 1;

            if self.player.poll_frame().is_none() {
                continue;
            }
            summary.delivered += 1;

            let played = track_frames.fetch_add(1, Ordering::SeqCst) + 1;
            if skip_after_frames.is_some_and(|limit| played >= limit) {
                track_frames.store(0, Ordering::SeqCst);
                if let Some(context) = self.player.current_context() {
                    println!("> Skipping {} after {} frames", context.effective_title(), played);
                }
                self.player.skip();
            }
        }

        self.player.clear_hooks();
        summary.loss = self.player.loss_report();
        summary
    }

    /// Nothing current, nothing loaded and nothing left in the queue
    fn is_drained(&self) -> bool {
        self.player.current_context().is_none() && self.player.is_queue_empty()
    }

    /// Most-recent-first history page; `end` defaults to the whole history
    pub fn history(&self, start: usize, end: Option<usize>) -> Vec<Arc<TrackContext>> {
        let end = end.unwrap_or_else(|| self.player.track_count_in_history());
        self.player.tracks_in_history(start, end)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn close(self) {
        self.player.destroy();
    }
}
