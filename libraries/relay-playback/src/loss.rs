//! Frame loss accounting
//!
//! Counts 20ms frame deliveries and misses for health reporting. Nothing in
//! the player makes decisions from these numbers; they are logged next to
//! engine exceptions and exposed through [`LossReport`].

use crate::types::FRAME_DURATION_MS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const MS_PER_MINUTE: u64 = 60_000;

/// Frames a healthy stream delivers per minute
pub const EXPECTED_FRAMES_PER_MINUTE: u64 = MS_PER_MINUTE / FRAME_DURATION_MS;

/// Running statistics over frame deliveries
#[derive(Debug, Clone, Default)]
pub struct AudioLossCounter {
    consecutive_success: u64,
    consecutive_loss: u64,
    total_success: u64,
    total_loss: u64,

    /// Wall-clock minute the `current_*` counters belong to
    current_minute: Option<u64>,
    current_success: u64,
    current_loss: u64,

    /// Counters of the last completed minute
    last_success: u64,
    last_loss: u64,

    /// First minute anything was counted
    first_minute: Option<u64>,
}

/// Snapshot of an [`AudioLossCounter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LossReport {
    pub consecutive_success: u64,
    pub consecutive_loss: u64,
    pub total_success: u64,
    pub total_loss: u64,
    pub last_minute_success: u64,
    pub last_minute_loss: u64,
    /// Whether the last-minute figures cover a full minute of observation
    pub last_minute_complete: bool,
}

impl AudioLossCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame was delivered
    pub fn on_success(&mut self) {
        self.on_success_at(now_ms());
    }

    /// No frame was available
    pub fn on_loss(&mut self) {
        self.on_loss_at(now_ms());
    }

    pub fn on_success_at(&mut self, now_ms: u64) {
        self.roll_minute(now_ms);
        self.consecutive_success += 1;
        self.consecutive_loss = 0;
        self.total_success += 1;
        self.current_success += 1;
    }

    pub fn on_loss_at(&mut self, now_ms: u64) {
        self.roll_minute(now_ms);
        self.consecutive_loss += 1;
        self.consecutive_success = 0;
        self.total_loss += 1;
        self.current_loss += 1;
    }

    pub fn total_success(&self) -> u64 {
        self.total_success
    }

    pub fn total_loss(&self) -> u64 {
        self.total_loss
    }

    pub fn consecutive_loss(&self) -> u64 {
        self.consecutive_loss
    }

    pub fn consecutive_success(&self) -> u64 {
        self.consecutive_success
    }

    pub fn report(&self) -> LossReport {
        LossReport {
            consecutive_success: self.consecutive_success,
            consecutive_loss: self.consecutive_loss,
            total_success: self.total_success,
            total_loss: self.total_loss,
            last_minute_success: self.last_success,
            last_minute_loss: self.last_loss,
            last_minute_complete: self.last_minute_complete(),
        }
    }

    fn last_minute_complete(&self) -> bool {
        match (self.first_minute, self.current_minute) {
            // Counting must have started before the last completed minute began
            (Some(first), Some(current)) => first + 1 < current,
            _ => false,
        }
    }

    fn roll_minute(&mut self, now_ms: u64) {
        let minute = now_ms / MS_PER_MINUTE;
        match self.current_minute {
            Some(current) if current == minute => {}
            Some(current) if minute == current + 1 => {
                self.last_success = self.current_success;
                self.last_loss = self.current_loss;
                self.current_success = 0;
                self.current_loss = 0;
                self.current_minute = Some(minute);
            }
            Some(_) => {
                // Skipped whole minutes (or the clock went backwards): the
                // minute before this one saw nothing
                self.last_success = 0;
                self.last_loss = 0;
                self.current_success = 0;
                self.current_loss = 0;
                self.current_minute = Some(minute);
            }
            None => {
                self.current_minute = Some(minute);
                self.first_minute = Some(minute);
            }
        }
    }
}

impl fmt::Display for LossReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "last minute: {} lost, {} sent of {} expected{}; total: {} lost, {} sent; streak: {} lost, {} sent",
            self.last_minute_loss,
            self.last_minute_success,
            EXPECTED_FRAMES_PER_MINUTE,
            if self.last_minute_complete { "" } else { " (partial)" },
            self.total_loss,
            self.total_success,
            self.consecutive_loss,
            self.consecutive_success,
        )
    }
}

impl fmt::Display for AudioLossCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.report().fmt(f)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_frames_per_minute() {
        assert_eq!(EXPECTED_FRAMES_PER_MINUTE, 3000);
    }

    #[test]
    fn streaks_reset_on_opposite_outcome() {
        let mut counter = AudioLossCounter::new();
        counter.on_success_at(0);
        counter.on_success_at(20);
        counter.on_loss_at(40);

        assert_eq!(counter.consecutive_success(), 0);
        assert_eq!(counter.consecutive_loss(), 1);
        assert_eq!(counter.total_success(), 2);
        assert_eq!(counter.total_loss(), 1);

        counter.on_success_at(60);
        assert_eq!(counter.consecutive_success(), 1);
        assert_eq!(counter.consecutive_loss(), 0);
    }

    #[test]
    fn minute_window_rolls_over() {
        let mut counter = AudioLossCounter::new();
        counter.on_success_at(1_000);
        counter.on_success_at(2_000);
        counter.on_loss_at(3_000);

        // Still in minute 0: nothing completed yet
        assert_eq!(counter.report().last_minute_success, 0);

        counter.on_success_at(MS_PER_MINUTE + 5);
        let report = counter.report();
        assert_eq!(report.last_minute_success, 2);
        assert_eq!(report.last_minute_loss, 1);
        // Counting started inside minute 0, so minute 0 was only partially seen
        assert!(!report.last_minute_complete);

        counter.on_loss_at(2 * MS_PER_MINUTE + 5);
        let report = counter.report();
        assert_eq!(report.last_minute_success, 1);
        assert_eq!(report.last_minute_loss, 0);
        assert!(report.last_minute_complete);
    }

    #[test]
    fn skipped_minutes_clear_window() {
        let mut counter = AudioLossCounter::new();
        counter.on_success_at(0);
        counter.on_success_at(5 * MS_PER_MINUTE);

        let report = counter.report();
        assert_eq!(report.last_minute_success, 0);
        assert_eq!(report.last_minute_loss, 0);
        assert_eq!(report.total_success, 2);
    }

    #[test]
    fn summary_mentions_totals() {
        let mut counter = AudioLossCounter::new();
        counter.on_loss_at(0);
        let summary = counter.to_string();
        assert!(summary.contains("total: 1 lost, 0 sent"), "{summary}");
        assert!(summary.contains("(partial)"), "{summary}");
    }
}
