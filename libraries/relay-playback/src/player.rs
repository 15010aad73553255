//! Player - per-session playback state machine
//!
//! Owns the current context, the history and the link to the decode engine.
//! Commands arrive from any thread; engine notifications arrive from the
//! engine's thread.
//!
//! # Concurrency
//!
//! ```text
//! command thread ──► lock(state) ──► engine.play_track / stop_track
//!                                         │ (may notify synchronously)
//! engine thread ───► mailbox ◄────────────┘
//!                       │
//!                       └─► drained by whoever holds the state lock
//! ```
//!
//! Every started track gets a fresh [`PlaybackToken`]. Engine events carrying
//! any other token are stale and dropped, so a late `TrackEnd` for a
//! superseded track can never advance playback twice. Hooks, the marker
//! handler and event publishing run after the state lock is released.

use crate::{
    engine::{DecodeEngine, EngineEvent, EngineListener, ListenerId, PlayRequest, PlaybackToken},
    error::{PlayerError, Result},
    events::{ErrorHook, EventBus, Hooks, PlayHook, PlayerEvent},
    history::History,
    loss::{AudioLossCounter, LossReport},
    marker::{SkipAtMarker, TrackEndMarkerHandler},
    provider::TrackProvider,
    types::{AudioTrack, EndReason, PlaybackState, PlayerConfig, TrackContext},
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Per-session playback controller
pub struct Player {
    engine: Arc<dyn DecodeEngine>,
    state: Mutex<PlayerState>,

    // Engine notifications waiting for the state lock
    mailbox_tx: Sender<EngineEvent>,
    mailbox_rx: Receiver<EngineEvent>,

    hooks: Mutex<Hooks>,
    marker_handler: Mutex<Arc<dyn TrackEndMarkerHandler>>,
    events: EventBus,
    listener: Mutex<Option<ListenerId>>,

    pub(crate) loss_counter: Mutex<AudioLossCounter>,
}

struct PlayerState {
    provider: Option<Arc<dyn TrackProvider>>,
    context: Option<Arc<TrackContext>>,

    /// Last context pulled from the provider; recorded when its track ends
    queued_for_history: Option<Arc<TrackContext>>,

    history: History,

    /// Token of the track the engine is expected to report on
    active_token: Option<PlaybackToken>,
    next_token: u64,

    reported_state: PlaybackState,
    destroyed: bool,
}

/// Work collected under the state lock, performed after it is released
#[derive(Default)]
struct Effects {
    played: Vec<Arc<TrackContext>>,
    errors: Vec<PlayerError>,
    markers: Vec<Arc<TrackContext>>,
    events: Vec<PlayerEvent>,
}

/// Mutable view of the player for the duration of one locked section
struct Transition<'a> {
    state: &'a mut PlayerState,
    engine: &'a dyn DecodeEngine,
    loss_counter: &'a Mutex<AudioLossCounter>,
    effects: Effects,
}

/// Forwards engine notifications without keeping the player alive
struct EngineBridge {
    player: Weak<Player>,
}

impl EngineListener for EngineBridge {
    fn on_event(&self, event: EngineEvent) {
        if let Some(player) = self.player.upgrade() {
            player.deliver(event);
        }
    }
}

impl Player {
    /// Create a player on top of `engine` and subscribe to its notifications
    pub fn new(engine: Arc<dyn DecodeEngine>, config: PlayerConfig) -> Arc<Self> {
        let (mailbox_tx, mailbox_rx) = unbounded();

        let marker_handler: Arc<dyn TrackEndMarkerHandler> = Arc::new(SkipAtMarker);

        let player = Arc::new(Self {
            engine,
            state: Mutex::new(PlayerState {
                provider: None,
                context: None,
                queued_for_history: None,
                history: History::new(config.history_size),
                active_token: None,
                next_token: 0,
                reported_state: PlaybackState::Idle,
                destroyed: false,
            }),
            mailbox_tx,
            mailbox_rx,
            hooks: Mutex::new(Hooks::default()),
            marker_handler: Mutex::new(marker_handler),
            events: EventBus::new(config.event_capacity),
            listener: Mutex::new(None),
            loss_counter: Mutex::new(AudioLossCounter::new()),
        });

        let bridge = Arc::new(EngineBridge {
            player: Arc::downgrade(&player),
        });
        let id = player.engine.add_listener(bridge);
        *player.listener.lock() = Some(id);

        if let Err(e) = player.set_volume(config.initial_volume) {
            tracing::warn!("Ignoring configured initial volume: {}", e);
        }

        player
    }

    /// Attach the supply provider, replacing any previous one
    pub fn set_track_provider(&self, provider: Arc<dyn TrackProvider>) {
        self.with_state(|state| state.provider = Some(provider));
    }

    /// Detach the supply provider; nothing new will start until one is set
    pub fn detach_track_provider(&self) {
        self.with_state(|state| state.provider = None);
    }

    /// Register the on-play hook, replacing any previous one
    pub fn set_on_play_hook<F>(&self, hook: F)
    where
        F: Fn(&Arc<TrackContext>) + Send + Sync + 'static,
    {
        let hook: PlayHook = Arc::new(hook);
        self.hooks.lock().on_play = Some(hook);
    }

    /// Register the on-error hook, replacing any previous one
    pub fn set_on_error_hook<F>(&self, hook: F)
    where
        F: Fn(&PlayerError) + Send + Sync + 'static,
    {
        let hook: ErrorHook = Arc::new(hook);
        self.hooks.lock().on_error = Some(hook);
    }

    pub fn clear_hooks(&self) {
        *self.hooks.lock() = Hooks::default();
    }

    /// Replace the handler invoked when a split context reaches its end
    pub fn set_marker_handler(&self, handler: Arc<dyn TrackEndMarkerHandler>) {
        *self.marker_handler.lock() = handler;
    }

    /// Receiver for [`PlayerEvent`]s
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn engine(&self) -> &Arc<dyn DecodeEngine> {
        &self.engine
    }

    // ===== Commands =====

    /// Resume if paused; start the next track if nothing is loaded
    pub fn play(&self) {
        tracing::trace!("play()");
        self.transition(|tx| {
            if tx.rejects_destroyed("play") {
                return;
            }
            tx.play();
        });
    }

    /// Pause (`true`) or resume and play (`false`)
    pub fn set_pause(&self, pause: bool) {
        tracing::trace!("set_pause({})", pause);
        self.transition(|tx| {
            if tx.rejects_destroyed("set_pause") {
                return;
            }
            if pause {
                tx.engine.set_paused(true);
            } else {
                tx.engine.set_paused(false);
                tx.play();
            }
        });
    }

    pub fn pause(&self) {
        tracing::trace!("pause()");
        self.transition(|tx| {
            if tx.rejects_destroyed("pause") {
                return;
            }
            tx.engine.set_paused(true);
        });
    }

    /// Clear the supply queue and stop the current track
    ///
    /// Pending notifications for the stopped track are discarded, so the
    /// player stays idle even if the engine reports the stop later.
    pub fn stop(&self) {
        tracing::trace!("stop()");
        self.transition(|tx| {
            if tx.rejects_destroyed("stop") {
                return;
            }
            tx.stop();
        });
    }

    /// Tell the provider the current track was skipped, then stop it
    ///
    /// The engine's `Stopped` notification advances to the next track.
    pub fn skip(&self) {
        tracing::trace!("skip()");
        self.transition(|tx| {
            if tx.rejects_destroyed("skip") {
                return;
            }
            tx.skip();
        });
    }

    /// Skip only if `context` is still the current one
    ///
    /// Returns whether a skip happened.
    pub fn skip_context(&self, context: &Arc<TrackContext>) -> bool {
        tracing::trace!("skip_context({})", context.id);
        self.transition(|tx| {
            if tx.rejects_destroyed("skip_context") {
                return false;
            }
            let is_current = tx
                .state
                .context
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, context));
            if is_current {
                tx.skip();
            }
            is_current
        })
    }

    /// Stop the current track without touching the supply queue
    pub fn stop_track(&self) {
        tracing::trace!("stop_track()");
        self.transition(|tx| {
            if tx.rejects_destroyed("stop_track") {
                return;
            }
            tx.stop_track();
        });
    }

    /// Restart the current context at the engine's position without
    /// announcing it through the on-play hook
    pub fn restart_current(&self) -> Result<()> {
        tracing::trace!("restart_current()");
        self.transition(|tx| {
            if tx.state.destroyed {
                return Err(PlayerError::Destroyed);
            }
            let context = tx
                .state
                .context
                .clone()
                .ok_or(PlayerError::NoTrackPlaying)?;
            let start = context.start_position_ms();
            let position = tx.engine.position_ms().max(start);
            tx.start(context, position, true);
            Ok(())
        })
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(PlayerError::InvalidVolume(volume));
        }
        let percent = (volume * 100.0).round() as u32;
        self.transition(|tx| {
            if tx.state.destroyed {
                return Err(PlayerError::Destroyed);
            }
            tx.engine.set_volume(percent);
            tx.effects
                .events
                .push(PlayerEvent::VolumeChanged { percent });
            Ok(())
        })
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume() as f32 / 100.0
    }

    pub fn position_ms(&self) -> u64 {
        self.engine.position_ms()
    }

    /// Seek within the current track
    ///
    /// Fails without touching the engine when nothing is playing or the
    /// track is a live stream.
    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        tracing::trace!("seek_to({})", position_ms);
        self.transition(|tx| {
            if tx.state.destroyed {
                return Err(PlayerError::Destroyed);
            }
            let context = tx
                .state
                .context
                .as_ref()
                .ok_or(PlayerError::NoTrackPlaying)?;
            if !context.track.is_seekable() {
                return Err(PlayerError::SeekNotSupported {
                    title: context.effective_title().to_string(),
                });
            }
            tx.engine.seek_to(position_ms);
            Ok(())
        })
    }

    /// Stop everything, detach from the engine and release it
    ///
    /// Safe to call more than once.
    pub fn destroy(&self) {
        tracing::trace!("destroy()");
        let first = self.transition(|tx| {
            if tx.state.destroyed {
                return false;
            }
            tx.stop();
            tx.state.destroyed = true;
            true
        });
        if !first {
            return;
        }

        if let Some(id) = self.listener.lock().take() {
            self.engine.remove_listener(id);
        }
        self.engine.release();
        tracing::debug!("Player destroyed");
    }

    // ===== Queries =====

    /// True when the engine has no track and the provider has nothing left
    pub fn is_queue_empty(&self) -> bool {
        tracing::trace!("is_queue_empty()");
        self.with_state(|state| {
            self.engine.playing_track().is_none()
                && state.provider.as_ref().map_or(true, |p| p.is_empty())
        })
    }

    /// Current context, or the provider's head when idle
    pub fn playing_track(&self) -> Option<Arc<TrackContext>> {
        tracing::trace!("playing_track()");
        self.with_state(|state| Self::playing_or_peeked(state, &*self.engine))
    }

    /// Current context only, without falling back to the provider
    pub fn current_context(&self) -> Option<Arc<TrackContext>> {
        self.with_state(|state| state.context.clone())
    }

    /// Playing (or next) context followed by the provider's remaining queue
    pub fn remaining_tracks(&self) -> Vec<Arc<TrackContext>> {
        tracing::trace!("remaining_tracks()");
        self.with_state(|state| {
            let mut list = Vec::new();
            if let Some(context) = Self::playing_or_peeked(state, &*self.engine) {
                list.push(context);
            }
            if let Some(provider) = &state.provider {
                list.extend(provider.as_list());
            }
            list
        })
    }

    /// Most-recent-first page of the history, empty if `end` runs past it
    pub fn tracks_in_history(&self, start: usize, end: usize) -> Vec<Arc<TrackContext>> {
        self.with_state(|state| state.history.slice(start, end))
    }

    pub fn track_count_in_history(&self) -> usize {
        self.with_state(|state| state.history.len())
    }

    pub fn is_history_empty(&self) -> bool {
        self.with_state(|state| state.history.is_empty())
    }

    pub fn is_playing(&self) -> bool {
        tracing::trace!("is_playing()");
        self.engine.playing_track().is_some() && !self.engine.is_paused()
    }

    pub fn is_paused(&self) -> bool {
        tracing::trace!("is_paused()");
        self.engine.is_paused()
    }

    pub fn state(&self) -> PlaybackState {
        self.with_state(|state| derive_state(state, &*self.engine))
    }

    pub fn loss_report(&self) -> LossReport {
        self.loss_counter.lock().report()
    }

    pub fn is_destroyed(&self) -> bool {
        self.with_state(|state| state.destroyed)
    }

    // ===== Internals =====

    fn playing_or_peeked(
        state: &PlayerState,
        engine: &dyn DecodeEngine,
    ) -> Option<Arc<TrackContext>> {
        if state.context.is_none() && engine.playing_track().is_none() {
            return state.provider.as_ref().and_then(|p| p.peek());
        }
        state.context.clone()
    }

    /// Access the state outside a transition
    ///
    /// Notifications that arrived while the lock was held are applied once
    /// it is released.
    fn with_state<R>(&self, f: impl FnOnce(&mut PlayerState) -> R) -> R {
        let result = f(&mut self.state.lock());
        self.drain_mailbox();
        result
    }

    /// Queue an engine notification and apply it if the lock is free
    fn deliver(&self, event: EngineEvent) {
        self.mailbox_tx.send(event).ok();
        self.drain_mailbox();
    }

    /// Run `f` under the state lock, then apply pending notifications and
    /// perform the collected effects
    fn transition<R>(&self, f: impl FnOnce(&mut Transition<'_>) -> R) -> R {
        let (result, effects) = {
            let mut guard = self.state.lock();
            let mut tx = Transition {
                state: &mut *guard,
                engine: &*self.engine,
                loss_counter: &self.loss_counter,
                effects: Effects::default(),
            };
            tx.drain(&self.mailbox_rx);
            let result = f(&mut tx);
            tx.drain(&self.mailbox_rx);
            tx.report_state_change();
            (result, tx.effects)
        };
        self.perform(effects);
        self.drain_mailbox();
        result
    }

    fn drain_mailbox(&self) {
        while !self.mailbox_rx.is_empty() {
            // Whoever holds the lock drains before releasing it
            let Some(mut guard) = self.state.try_lock() else {
                return;
            };
            let mut tx = Transition {
                state: &mut *guard,
                engine: &*self.engine,
                loss_counter: &self.loss_counter,
                effects: Effects::default(),
            };
            tx.drain(&self.mailbox_rx);
            tx.report_state_change();
            let effects = tx.effects;
            drop(guard);
            self.perform(effects);
        }
    }

    fn perform(&self, effects: Effects) {
        let Effects {
            played,
            errors,
            markers,
            events,
        } = effects;

        for event in events {
            self.events.publish(event);
        }

        if !played.is_empty() {
            let hook = self.hooks.lock().on_play.clone();
            if let Some(hook) = hook {
                for context in &played {
                    hook(context);
                }
            }
        }

        for error in errors {
            self.events.publish(PlayerEvent::Error {
                message: error.to_string(),
            });
            let hook = self.hooks.lock().on_error.clone();
            match hook {
                Some(hook) => hook(&error),
                None => tracing::debug!("No error hook registered for: {}", error),
            }
        }

        for context in markers {
            let handler = self.marker_handler.lock().clone();
            handler.on_marker_reached(self, &context);
        }
    }
}

impl Transition<'_> {
    fn rejects_destroyed(&self, command: &str) -> bool {
        if self.state.destroyed {
            tracing::debug!("Ignoring {}() on destroyed player", command);
        }
        self.state.destroyed
    }

    fn play(&mut self) {
        if self.engine.is_paused() {
            self.engine.set_paused(false);
        }
        if self.engine.playing_track().is_none() {
            self.load_and_play();
        }
    }

    fn stop(&mut self) {
        if let Some(provider) = &self.state.provider {
            provider.clear();
        }
        self.stop_track();
        self.state.active_token = None;
    }

    fn skip(&mut self) {
        if let Some(provider) = &self.state.provider {
            provider.skipped();
        }
        self.stop_track();
    }

    fn stop_track(&mut self) {
        self.state.context = None;
        self.engine.stop_track();
    }

    /// Pull the next context from the provider and start it
    fn load_and_play(&mut self) {
        tracing::trace!("load_and_play()");

        let Some(provider) = self.state.provider.clone() else {
            tracing::warn!("No track provider attached, nothing to play");
            return;
        };

        // The engine dropped the previous track (skip, stop_track) but its end
        // report has not arrived yet. Once a new token is issued that report
        // is stale, so the previous track is recorded here.
        if self.state.active_token.take().is_some() {
            tracing::debug!("Superseding a track whose end was not reported yet");
            self.record_history();
        }

        if let Some(context) = provider.provide() {
            self.state.queued_for_history = Some(context.clone());
            let start = context.start_position_ms();
            self.start(context, start, false);
        }
    }

    /// Make `context` current and hand it to the engine in one step
    fn start(&mut self, context: Arc<TrackContext>, start_ms: u64, silent: bool) {
        tracing::debug!("Starting {} at {}ms", context.effective_title(), start_ms);

        self.state.next_token += 1;
        let token = PlaybackToken(self.state.next_token);
        self.state.active_token = Some(token);
        self.state.context = Some(context.clone());

        let end_marker_ms = context.end_marker_ms();
        if let Some(end) = end_marker_ms {
            tracing::info!(
                "Bounded playback of {}: start {}ms, end {}ms",
                context.effective_title(),
                context.start_position_ms(),
                end
            );
        }

        self.engine.play_track(PlayRequest {
            token,
            track: context.track.clone(),
            start_ms,
            end_marker_ms,
        });

        self.effects.events.push(PlayerEvent::TrackStarted {
            context_id: context.id.clone(),
            title: context.effective_title().to_string(),
            start_ms,
        });
        if !silent {
            self.effects.played.push(context);
        }
    }

    fn record_history(&mut self) {
        if let Some(context) = self.state.queued_for_history.clone() {
            self.effects.events.push(PlayerEvent::HistoryRecorded {
                context_id: context.id.clone(),
            });
            self.state.history.record(context);
        }
    }

    fn drain(&mut self, mailbox: &Receiver<EngineEvent>) {
        while let Ok(event) = mailbox.try_recv() {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: EngineEvent) {
        if self.state.active_token != Some(event.token()) {
            tracing::trace!("Dropping stale engine event {:?}", event);
            return;
        }

        match event {
            EngineEvent::TrackEnd { track, reason, .. } => self.on_track_end(&track, reason),
            EngineEvent::TrackException { track, message, .. } => {
                tracing::error!(
                    "Engine encountered an exception while playing {}: {}\nPerformance stats for errored track: {}",
                    track.identifier,
                    message,
                    self.loss_counter.lock().report()
                );
            }
            EngineEvent::TrackStuck {
                track,
                threshold_ms,
                ..
            } => {
                tracing::error!(
                    "Engine got stuck for {}ms while playing {}\nPerformance stats for stuck track: {}",
                    threshold_ms,
                    track.identifier,
                    self.loss_counter.lock().report()
                );
            }
            EngineEvent::MarkerReached { position_ms, .. } => {
                if let Some(context) = self.state.context.clone() {
                    tracing::info!(
                        "Marker reached at {}ms for {}",
                        position_ms,
                        context.effective_title()
                    );
                    self.effects.markers.push(context);
                }
            }
        }
    }

    fn on_track_end(&mut self, track: &AudioTrack, reason: EndReason) {
        tracing::trace!(
            "on_track_end({} {:?} {})",
            track.title,
            reason,
            reason.may_start_next()
        );

        match reason {
            EndReason::Finished | EndReason::Stopped => {
                self.finish_current(reason);
                self.record_history();
                self.load_and_play();
            }
            EndReason::Cleanup => {
                tracing::info!("Track {} was cleaned up", track.identifier);
            }
            EndReason::LoadFailed => {
                self.finish_current(reason);
                self.effects.errors.push(PlayerError::TrackLoadFailed {
                    title: track.title.clone(),
                });
                if let Some(provider) = &self.state.provider {
                    provider.skipped();
                }
                self.load_and_play();
            }
            EndReason::Replaced => {
                tracing::warn!(
                    "Track {} ended with unexpected reason: {:?}",
                    track.identifier,
                    reason
                );
            }
        }
    }

    /// The engine is done with the active token
    fn finish_current(&mut self, reason: EndReason) {
        let context = self.state.context.take();
        self.state.active_token = None;
        self.effects.events.push(PlayerEvent::TrackEnded {
            context_id: context.map(|c| c.id.clone()),
            reason,
        });
    }

    fn report_state_change(&mut self) {
        let state = derive_state(&*self.state, self.engine);
        if state != self.state.reported_state {
            self.state.reported_state = state;
            self.effects
                .events
                .push(PlayerEvent::StateChanged { state });
        }
    }
}

fn derive_state(state: &PlayerState, engine: &dyn DecodeEngine) -> PlaybackState {
    match (&state.context, engine.playing_track()) {
        (Some(_), Some(_)) if engine.is_paused() => PlaybackState::Paused,
        (Some(_), Some(_)) => PlaybackState::Playing,
        _ => PlaybackState::Idle,
    }
}
