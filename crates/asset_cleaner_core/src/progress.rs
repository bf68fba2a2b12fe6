//! crates/asset_cleaner_core/src/progress.rs
//!
//! Approximate progress for the sweep. Real checkpoints and a timer-driven estimate
//! both feed the same monotone percentage; it is a UI affordance only.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

pub const ASSETS_LISTED: u8 = 10;
pub const PAGES_START: u8 = 10;
pub const PAGES_END: u8 = 80;
pub const STYLES_START: u8 = 85;
pub const STYLES_END: u8 = 95;
pub const DONE: u8 = 100;

#[derive(Debug, Default)]
pub struct ProgressTracker {
    percent: AtomicU8,
    stopped: AtomicBool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Records a real checkpoint. Never moves backwards.
    pub fn advance_to(&self, percent: u8) {
        self.percent.fetch_max(percent.min(DONE), Ordering::Relaxed);
    }

    /// Nudges the estimate by one point without crossing `ceiling`.
    /// Returns `false` once the tracker has been stopped.
    pub fn tick(&self, ceiling: u8) -> bool {
        if self.is_stopped() {
            return false;
        }
        let _ = self
            .percent
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| {
                (p < ceiling).then_some(p + 1)
            });
        true
    }

    /// Stops the estimate timer; the value stays where it is.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// Maps `done` of `total` pages into the page sub-range.
/// Zero pages skips the math entirely.
pub fn page_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return PAGES_END;
    }
    let span = (PAGES_END - PAGES_START) as usize;
    let scaled = span * done.min(total) / total;
    PAGES_START + scaled as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_are_monotone() {
        let tracker = ProgressTracker::new();
        tracker.advance_to(40);
        tracker.advance_to(20);
        assert_eq!(tracker.percent(), 40);
        tracker.advance_to(250);
        assert_eq!(tracker.percent(), DONE);
    }

    #[test]
    fn tick_respects_ceiling_and_stop() {
        let tracker = ProgressTracker::new();
        tracker.advance_to(8);
        assert!(tracker.tick(9));
        assert!(tracker.tick(9));
        assert_eq!(tracker.percent(), 9);

        tracker.stop();
        assert!(!tracker.tick(50));
        assert_eq!(tracker.percent(), 9);
    }

    #[test]
    fn page_percent_scales_into_range() {
        assert_eq!(page_percent(0, 4), PAGES_START);
        assert_eq!(page_percent(2, 4), 45);
        assert_eq!(page_percent(4, 4), PAGES_END);
        assert_eq!(page_percent(0, 0), PAGES_END);
    }
}
