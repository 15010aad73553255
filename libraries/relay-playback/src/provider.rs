//! Track supply
//!
//! The player pulls the next context from a [`TrackProvider`]. Ordering
//! policy belongs to the provider; the player only consumes it.

use crate::types::TrackContext;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Upstream queue the player draws tracks from
///
/// Methods take `&self`: implementations serialize their own mutations.
pub trait TrackProvider: Send + Sync {
    fn is_empty(&self) -> bool;

    /// Head of the queue without removing it
    fn peek(&self) -> Option<Arc<TrackContext>>;

    /// The user skipped the current track
    ///
    /// Only a signal; the player advances separately by calling
    /// [`provide`](TrackProvider::provide).
    fn skipped(&self);

    /// Remove and return the next context to play
    fn provide(&self) -> Option<Arc<TrackContext>>;

    fn clear(&self);

    /// Remaining contexts in play order
    fn as_list(&self) -> Vec<Arc<TrackContext>>;
}

/// Plain FIFO provider
///
/// ```text
/// add(A) add(B) add(C)
///   provide() -> A
///   queue: [B, C]
/// ```
#[derive(Debug, Default)]
pub struct QueueProvider {
    inner: Mutex<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    contexts: VecDeque<Arc<TrackContext>>,

    /// Most recently provided context (what "skipped" refers to)
    last_provided: Option<Arc<TrackContext>>,

    skip_count: usize,
    last_skipped: Option<String>,
}

impl QueueProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contexts(contexts: impl IntoIterator<Item = Arc<TrackContext>>) -> Self {
        let provider = Self::new();
        provider.add_all(contexts);
        provider
    }

    /// Append to the end of the queue
    pub fn add(&self, context: Arc<TrackContext>) {
        self.inner.lock().contexts.push_back(context);
    }

    pub fn add_all(&self, contexts: impl IntoIterator<Item = Arc<TrackContext>>) {
        self.inner.lock().contexts.extend(contexts);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().contexts.len()
    }

    /// Id of the context most recently reported as skipped
    pub fn last_skipped(&self) -> Option<String> {
        self.inner.lock().last_skipped.clone()
    }

    pub fn skip_count(&self) -> usize {
        self.inner.lock().skip_count
    }
}

impl TrackProvider for QueueProvider {
    fn is_empty(&self) -> bool {
        self.inner.lock().contexts.is_empty()
    }

    fn peek(&self) -> Option<Arc<TrackContext>> {
        self.inner.lock().contexts.front().cloned()
    }

    fn skipped(&self) {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.last_provided.as_ref().map(|c| c.id.clone()) {
            tracing::debug!("Context {} skipped", id);
            inner.skip_count += 1;
            inner.last_skipped = Some(id);
        }
    }

    fn provide(&self) -> Option<Arc<TrackContext>> {
        let mut inner = self.inner.lock();
        let next = inner.contexts.pop_front();
        if next.is_some() {
            inner.last_provided.clone_from(&next);
        }
        next
    }

    fn clear(&self) {
        self.inner.lock().contexts.clear();
    }

    fn as_list(&self) -> Vec<Arc<TrackContext>> {
        self.inner.lock().contexts.iter().cloned().collect()
    }
}
