//! Playback history tracking
//!
//! Bounded record of contexts that finished playing, for "recently played"
//! listings.

use crate::types::TrackContext;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of contexts kept
pub const DEFAULT_HISTORY_SIZE: usize = 20;

/// Playback history with bounded size
///
/// Insertion order is completion order. When full, the oldest entry is
/// discarded before the new one is appended.
#[derive(Debug, Clone)]
pub struct History {
    /// History buffer (most recent = back)
    contexts: VecDeque<Arc<TrackContext>>,

    /// Maximum history size
    capacity: usize,
}

impl History {
    /// Create new history with specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            contexts: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a finished context, evicting the oldest if at capacity
    pub fn record(&mut self, context: Arc<TrackContext>) {
        if self.capacity == 0 {
            return;
        }
        while self.contexts.len() >= self.capacity {
            self.contexts.pop_front();
        }
        self.contexts.push_back(context);
    }

    /// Most-recent-first page of the history
    ///
    /// The range is `[start, max(end, start))`. If `end` runs past the number
    /// of recorded entries the result is empty, not a partial page.
    pub fn slice(&self, start: usize, end: usize) -> Vec<Arc<TrackContext>> {
        let end = end.max(start);
        if self.contexts.len() < end {
            return Vec::new();
        }

        self.contexts
            .iter()
            .rev()
            .skip(start)
            .take(end - start)
            .cloned()
            .collect()
    }

    /// Most recently recorded context
    pub fn most_recent(&self) -> Option<&Arc<TrackContext>> {
        self.contexts.back()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn clear(&mut self) {
        self.contexts.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioTrack;

    fn context(id: &str) -> Arc<TrackContext> {
        let track = Arc::new(AudioTrack::new(
            format!("/music/{}.opus", id),
            format!("Track {}", id),
            180_000,
        ));
        Arc::new(TrackContext::new(id, track))
    }

    fn ids(contexts: &[Arc<TrackContext>]) -> Vec<&str> {
        contexts.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn create_history() {
        let history = History::default();
        assert_eq!(history.capacity(), 20);
        assert_eq!(history.len(), 0);
        assert!(history.is_empty());
    }

    #[test]
    fn record_appends() {
        let mut history = History::new(10);
        history.record(context("1"));
        history.record(context("2"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.most_recent().unwrap().id, "2");
    }

    #[test]
    fn history_bounded() {
        let mut history = History::new(3);
        for id in ["1", "2", "3", "4"] {
            history.record(context(id));
        }

        assert_eq!(history.len(), 3);
        // Track 1 discarded
        assert_eq!(ids(&history.slice(0, 3)), vec!["4", "3", "2"]);
    }

    #[test]
    fn slice_is_most_recent_first() {
        let mut history = History::new(10);
        for id in ["1", "2", "3", "4", "5"] {
            history.record(context(id));
        }

        assert_eq!(ids(&history.slice(0, 2)), vec!["5", "4"]);
        assert_eq!(ids(&history.slice(2, 5)), vec!["3", "2", "1"]);
    }

    #[test]
    fn slice_past_end_is_empty() {
        let mut history = History::new(10);
        for id in ["1", "2", "3"] {
            history.record(context(id));
        }

        assert!(history.slice(0, 5).is_empty());
        assert_eq!(history.slice(0, 3).len(), 3);
    }

    #[test]
    fn slice_with_end_before_start_is_empty() {
        let mut history = History::new(10);
        for id in ["1", "2", "3"] {
            history.record(context(id));
        }

        assert!(history.slice(2, 1).is_empty());
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut history = History::new(0);
        history.record(context("1"));
        assert!(history.is_empty());
    }

    #[test]
    fn clear_history() {
        let mut history = History::new(10);
        history.record(context("1"));
        history.clear();
        assert!(history.is_empty());
    }
}
