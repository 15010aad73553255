//! Property-based tests for history bounds, history paging and volume
//! mapping

mod common;

use common::{context, FakeEngine};
use proptest::prelude::*;
use relay_playback::{History, Player, PlayerConfig, DEFAULT_HISTORY_SIZE};

proptest! {
    /// History never exceeds its capacity and keeps the newest entries,
    /// most recent first
    #[test]
    fn history_keeps_newest_within_capacity(count in 0usize..80) {
        let mut history = History::new(DEFAULT_HISTORY_SIZE);
        for i in 0..count {
            history.record(context(&format!("t{i}"), 1000));
        }

        let kept = count.min(DEFAULT_HISTORY_SIZE);
        prop_assert_eq!(history.len(), kept);

        let page = history.slice(0, kept);
        let expected: Vec<String> = (count - kept..count).rev().map(|i| format!("t{i}")).collect();
        let actual: Vec<String> = page.iter().map(|c| c.id.clone()).collect();
        prop_assert_eq!(actual, expected);
    }

    /// A page is either the full requested range or empty
    #[test]
    fn history_page_is_all_or_nothing(
        recorded in 0usize..25,
        start in 0usize..30,
        end in 0usize..30,
    ) {
        let mut history = History::new(DEFAULT_HISTORY_SIZE);
        for i in 0..recorded {
            history.record(context(&format!("t{i}"), 1000));
        }

        let page = history.slice(start, end);
        let effective_end = end.max(start);
        if effective_end > history.len() {
            prop_assert!(page.is_empty());
        } else {
            prop_assert_eq!(page.len(), effective_end - start);
        }
    }

    /// Volume set in [0, 1] reads back as the same whole percent
    #[test]
    fn volume_maps_to_whole_percent(percent in 0u32..=100) {
        let engine = FakeEngine::new();
        let player = Player::new(engine, PlayerConfig::default());

        player.set_volume(percent as f32 / 100.0).unwrap();

        prop_assert_eq!((player.volume() * 100.0).round() as u32, percent);
    }
}
