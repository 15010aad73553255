//! Shared test helpers: a scripted decode engine and context builders

#![allow(dead_code)]

use parking_lot::Mutex;
use relay_playback::{
    AudioFrame, AudioTrack, DecodeEngine, EndReason, EngineEvent, EngineListener, ListenerId,
    PlayRequest, PlaybackToken, TrackContext,
};
use std::collections::VecDeque;
use std::sync::Arc;

/// Calls the player made on the engine, in order
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Play {
        identifier: String,
        start_ms: u64,
        end_marker_ms: Option<u64>,
    },
    Stop,
    SetPaused(bool),
    Seek(u64),
    SetVolume(u32),
    Release,
}

#[derive(Default)]
struct EngineInner {
    playing: Option<PlayRequest>,
    paused: bool,
    position_ms: u64,
    volume: u32,
    frames: VecDeque<AudioFrame>,
    calls: Vec<EngineCall>,
    listeners: Vec<(ListenerId, Arc<dyn EngineListener>)>,
    next_listener: u64,
}

/// In-memory engine that records every call
///
/// Notifications are only emitted when a test asks for them, unless
/// `stops_synchronously` is set, in which case `stop_track` reports
/// `Stopped` from inside the call like a real engine would.
#[derive(Default)]
pub struct FakeEngine {
    inner: Mutex<EngineInner>,
    stops_synchronously: bool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EngineInner {
                volume: 100,
                ..EngineInner::default()
            }),
            stops_synchronously: false,
        })
    }

    pub fn stopping_synchronously() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EngineInner {
                volume: 100,
                ..EngineInner::default()
            }),
            stops_synchronously: true,
        })
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Identifiers of every track started, in order
    pub fn started(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Play { identifier, .. } => Some(identifier),
                _ => None,
            })
            .collect()
    }

    pub fn current_request(&self) -> Option<PlayRequest> {
        self.inner.lock().playing.clone()
    }

    pub fn current_token(&self) -> Option<PlaybackToken> {
        self.current_request().map(|r| r.token)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn push_frame(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        let timecode_ms = inner.position_ms;
        inner.frames.push_back(AudioFrame {
            data: data.to_vec(),
            timecode_ms,
        });
    }

    pub fn set_position(&self, position_ms: u64) {
        self.inner.lock().position_ms = position_ms;
    }

    /// End the playing track with `reason`, as the engine thread would
    pub fn end_track(&self, reason: EndReason) {
        let request = self.inner.lock().playing.take();
        if let Some(request) = request {
            self.emit(EngineEvent::TrackEnd {
                token: request.token,
                track: request.track,
                reason,
            });
        }
    }

    /// Report an end for `request` without touching the engine state
    pub fn end_request(&self, request: &PlayRequest, reason: EndReason) {
        self.emit(EngineEvent::TrackEnd {
            token: request.token,
            track: request.track.clone(),
            reason,
        });
    }

    pub fn emit(&self, event: EngineEvent) {
        let listeners: Vec<_> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener.on_event(event.clone());
        }
    }
}

impl DecodeEngine for FakeEngine {
    fn play_track(&self, request: PlayRequest) {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Play {
            identifier: request.track.identifier.clone(),
            start_ms: request.start_ms,
            end_marker_ms: request.end_marker_ms,
        });
        inner.position_ms = request.start_ms;
        inner.playing = Some(request);
    }

    fn stop_track(&self) {
        let stopped = {
            let mut inner = self.inner.lock();
            inner.calls.push(EngineCall::Stop);
            inner.playing.take()
        };
        if self.stops_synchronously {
            if let Some(request) = stopped {
                self.end_request(&request, EndReason::Stopped);
            }
        }
    }

    fn set_paused(&self, paused: bool) {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SetPaused(paused));
        inner.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    fn playing_track(&self) -> Option<Arc<AudioTrack>> {
        self.inner.lock().playing.as_ref().map(|r| r.track.clone())
    }

    fn position_ms(&self) -> u64 {
        self.inner.lock().position_ms
    }

    fn seek_to(&self, position_ms: u64) {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Seek(position_ms));
        inner.position_ms = position_ms;
    }

    fn set_volume(&self, percent: u32) {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SetVolume(percent));
        inner.volume = percent;
    }

    fn volume(&self) -> u32 {
        self.inner.lock().volume
    }

    fn provide_frame(&self) -> Option<AudioFrame> {
        self.inner.lock().frames.pop_front()
    }

    fn add_listener(&self, listener: Arc<dyn EngineListener>) -> ListenerId {
        let mut inner = self.inner.lock();
        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner.listeners.push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.inner.lock().listeners.retain(|(lid, _)| *lid != id);
    }

    fn release(&self) {
        self.inner.lock().calls.push(EngineCall::Release);
    }
}

pub fn track(id: &str, length_ms: u64) -> Arc<AudioTrack> {
    Arc::new(AudioTrack::new(id, format!("Track {}", id), length_ms))
}

pub fn context(id: &str, length_ms: u64) -> Arc<TrackContext> {
    Arc::new(TrackContext::new(id, track(id, length_ms)))
}

pub fn split_context(id: &str, start_ms: u64, duration_ms: u64) -> Arc<TrackContext> {
    Arc::new(TrackContext::split(
        id,
        track(id, 600_000),
        format!("Part {}", id),
        start_ms,
        duration_ms,
    ))
}

pub fn ids(contexts: &[Arc<TrackContext>]) -> Vec<&str> {
    contexts.iter().map(|c| c.id.as_str()).collect()
}
