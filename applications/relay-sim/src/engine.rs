//! Simulated decode engine
//!
//! A decoder thread ticks once per frame interval. Each tick it encodes one
//! 20ms frame of the playing track into a bounded buffer and reports marker
//! and end-of-track events. Nothing is actually decoded; frames carry an
//! opus silence payload.
//!
//! ```text
//! Player (command thread)        Decoder thread          Transport loop
//!        │                             │                        │
//!        │ play_track(request)         │                        │
//!        │────────────────────────────>│ tick: buffer frame     │
//!        │                             │──────────────────────> │ provide_frame()
//!        │      on_event(TrackEnd)     │                        │
//!        │<────────────────────────────│                        │
//! ```
//!
//! All notifications are dispatched from the decoder thread, including the
//! `Stopped` end caused by `stop_track`.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use relay_playback::{
    AudioFrame, AudioTrack, DecodeEngine, EndReason, EngineEvent, EngineListener, ListenerId,
    PlayRequest, FRAME_DURATION_MS,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Opus TOC byte plus a zero-length frame: 20ms of silence
const SILENCE_FRAME: [u8; 3] = [0xF8, 0xFF, 0xFE];

/// Frames buffered ahead of the transport
const FRAME_BUFFER: usize = 50;

pub struct SimEngine {
    shared: Arc<Shared>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: Mutex<DecoderState>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn EngineListener>)>>,

    frames_tx: Sender<AudioFrame>,
    frames_rx: Receiver<AudioFrame>,

    /// Events raised by engine calls, dispatched on the next tick
    outbox_tx: Sender<EngineEvent>,
    outbox_rx: Receiver<EngineEvent>,
}

#[derive(Default)]
struct DecoderState {
    playing: Option<PlayRequest>,
    paused: bool,
    position_ms: u64,
    volume: u32,
    marker_sent: bool,
    next_listener: u64,
}

impl SimEngine {
    /// Start the decoder thread, ticking every `frame_interval`
    pub fn new(frame_interval: Duration) -> std::io::Result<Arc<Self>> {
        let (frames_tx, frames_rx) = bounded(FRAME_BUFFER);
        let (outbox_tx, outbox_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let shared = Arc::new(Shared {
            state: Mutex::new(DecoderState {
                volume: 100,
                ..DecoderState::default()
            }),
            listeners: Mutex::new(Vec::new()),
            frames_tx,
            frames_rx,
            outbox_tx,
            outbox_rx,
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("sim-decoder".to_string())
            .spawn(move || decoder_thread(&worker_shared, &shutdown_rx, frame_interval))?;

        Ok(Arc::new(Self {
            shared,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Stop the decoder thread and wait for it
    pub fn shutdown(&self) {
        // Dropping the sender disconnects the worker's receiver
        self.shutdown_tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            // The last engine handle can be dropped from a listener call
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::error!("Decoder thread panicked");
            }
        }
    }

    fn clear_frames(&self) {
        while self.shared.frames_rx.try_recv().is_ok() {}
    }
}

impl Drop for SimEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DecodeEngine for SimEngine {
    fn play_track(&self, request: PlayRequest) {
        tracing::debug!(
            "Decoder loading {} at {}ms",
            request.track.identifier,
            request.start_ms
        );
        self.clear_frames();

        let mut state = self.shared.state.lock();
        state.position_ms = request.start_ms;
        state.marker_sent = false;
        if let Some(previous) = state.playing.replace(request) {
            self.shared.outbox_tx.send(track_end(previous, EndReason::Replaced)).ok();
        }
    }

    fn stop_track(&self) {
        self.clear_frames();
        let stopped = self.shared.state.lock().playing.take();
        if let Some(request) = stopped {
            self.shared.outbox_tx.send(track_end(request, EndReason::Stopped)).ok();
        }
    }

    fn set_paused(&self, paused: bool) {
        self.shared.state.lock().paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    fn playing_track(&self) -> Option<Arc<AudioTrack>> {
        self.shared
            .state
            .lock()
            .playing
            .as_ref()
            .map(|r| r.track.clone())
    }

    fn position_ms(&self) -> u64 {
        self.shared.state.lock().position_ms
    }

    fn seek_to(&self, position_ms: u64) {
        self.clear_frames();
        let mut state = self.shared.state.lock();
        state.position_ms = position_ms;
        state.marker_sent = false;
    }

    fn set_volume(&self, percent: u32) {
        self.shared.state.lock().volume = percent;
    }

    fn volume(&self) -> u32 {
        self.shared.state.lock().volume
    }

    fn provide_frame(&self) -> Option<AudioFrame> {
        self.shared.frames_rx.try_recv().ok()
    }

    fn add_listener(&self, listener: Arc<dyn EngineListener>) -> ListenerId {
        let id = {
            let mut state = self.shared.state.lock();
            state.next_listener += 1;
            ListenerId(state.next_listener)
        };
        self.shared.listeners.lock().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.shared.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    fn release(&self) {
        self.shutdown();
    }
}

fn track_end(request: PlayRequest, reason: EndReason) -> EngineEvent {
    EngineEvent::TrackEnd {
        token: request.token,
        track: request.track,
        reason,
    }
}

fn decoder_thread(shared: &Shared, shutdown_rx: &Receiver<()>, frame_interval: Duration) {
    tracing::debug!("Decoder thread started");

    loop {
        match shutdown_rx.recv_timeout(frame_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let mut events: Vec<EngineEvent> = shared.outbox_rx.try_iter().collect();
        events.extend(tick(shared));
        dispatch(shared, events);
    }

    tracing::debug!("Decoder thread exiting");
}

/// Encode one frame of the playing track
fn tick(shared: &Shared) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    let mut state = shared.state.lock();

    let Some(request) = state.playing.clone() else {
        return events;
    };
    if state.paused {
        return events;
    }

    let frame = AudioFrame {
        data: SILENCE_FRAME.to_vec(),
        timecode_ms: state.position_ms,
    };
    if shared.frames_tx.try_send(frame).is_ok() {
        state.position_ms += FRAME_DURATION_MS;
    }

    if let Some(marker) = request.end_marker_ms {
        if !state.marker_sent && state.position_ms >= marker {
            state.marker_sent = true;
            events.push(EngineEvent::MarkerReached {
                token: request.token,
                position_ms: state.position_ms,
            });
        }
    }

    if !request.track.is_stream && state.position_ms >= request.track.length_ms {
        state.playing = None;
        events.push(track_end(request, EndReason::Finished));
    }

    events
}

fn dispatch(shared: &Shared, events: Vec<EngineEvent>) {
    if events.is_empty() {
        return;
    }

    let listeners: Vec<_> = shared
        .listeners
        .lock()
        .iter()
        .map(|(_, listener)| listener.clone())
        .collect();

    for event in events {
        for listener in &listeners {
            listener.on_event(event.clone());
        }
    }
}
