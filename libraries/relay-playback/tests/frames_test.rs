//! Frame supply and concurrent access

mod common;

use common::{context, FakeEngine};
use relay_playback::{EndReason, FrameSupplier, Player, PlayerConfig, QueueProvider};
use std::sync::Arc;
use std::thread;

fn player_with(engine: &Arc<FakeEngine>) -> Arc<Player> {
    Player::new(engine.clone(), PlayerConfig::default())
}

#[test]
fn buffered_frame_is_handed_over_once() {
    let engine = FakeEngine::new();
    let player = player_with(&engine);
    engine.push_frame(&[0xF8, 0xFF, 0xFE]);

    let frame = player.poll_frame().unwrap();
    assert_eq!(frame.data, vec![0xF8, 0xFF, 0xFE]);
    assert!(player.poll_frame().is_none());
}

#[test]
fn missing_frame_counts_one_loss() {
    let engine = FakeEngine::new();
    let player = player_with(&engine);

    assert!(player.poll_frame().is_none());

    let report = player.loss_report();
    assert_eq!(report.total_loss, 1);
    assert_eq!(report.total_success, 0);
    assert_eq!(report.consecutive_loss, 1);
}

#[test]
fn delivered_frames_count_as_success() {
    let engine = FakeEngine::new();
    let player = player_with(&engine);
    for _ in 0..3 {
        engine.push_frame(&[1]);
    }

    for _ in 0..3 {
        assert!(player.poll_frame().is_some());
    }
    player.poll_frame();

    let report = player.loss_report();
    assert_eq!(report.total_success, 3);
    assert_eq!(report.total_loss, 1);
    assert_eq!(report.consecutive_success, 0);
}

#[test]
fn frames_are_opus() {
    let engine = FakeEngine::new();
    assert!(player_with(&engine).is_opus());
}

#[test]
fn concurrent_commands_and_notifications_stay_consistent() {
    let engine = FakeEngine::new();
    let player = player_with(&engine);
    let contexts: Vec<_> = (0..200).map(|i| context(&format!("t{i}"), 1000)).collect();
    player.set_track_provider(Arc::new(QueueProvider::with_contexts(contexts)));
    player.play();

    let commands = {
        let player = player.clone();
        thread::spawn(move || {
            for i in 0..100 {
                if i % 3 == 0 {
                    player.skip();
                } else {
                    player.play();
                }
                player.tracks_in_history(0, 5);
            }
        })
    };
    let notifications = {
        let engine = engine.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                engine.end_track(EndReason::Finished);
                engine.push_frame(&[0]);
            }
        })
    };
    let transport = {
        let player = player.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                player.poll_frame();
            }
        })
    };

    commands.join().unwrap();
    notifications.join().unwrap();
    transport.join().unwrap();

    // Each context is pulled from the queue at most once
    let mut started = engine.started();
    let total = started.len();
    started.sort();
    started.dedup();
    assert_eq!(started.len(), total);

    assert!(player.track_count_in_history() <= 20);
    let report = player.loss_report();
    assert_eq!(report.total_success + report.total_loss, 100);
}
