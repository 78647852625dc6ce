//! C4 — Hysteresis/Dominance Tracker. Tracks how long a challenger has led
//! the current primary by at least `switch_margin`, so a single noisy tick
//! can never trigger a switch on its own.

use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct DominanceTracker {
    dominance_since: HashMap<String, Instant>,
}

impl DominanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or clears dominance for `best` given the delta against the
    /// current primary. If `best` leads by at least `margin` and is not
    /// already current, its dominance timer starts (if absent) and every
    /// other challenger's timer is evicted. Otherwise `best`'s timer (if any)
    /// is cleared.
    pub fn observe(&mut self, best: &str, delta: f64, margin: f64, is_current: bool, now: Instant) {
        if delta >= margin && !is_current {
            self.dominance_since.entry(best.to_string()).or_insert(now);
            self.dominance_since.retain(|k, _| k == best);
        } else {
            self.dominance_since.remove(best);
        }
    }

    /// Seconds `best` has been dominant, or `None` if it isn't currently
    /// tracked as dominant.
    pub fn duration_s(&self, best: &str, now: Instant) -> Option<f64> {
        self.dominance_since
            .get(best)
            .map(|since| now.saturating_duration_since(*since).as_secs_f64())
    }

    pub fn clear(&mut self) {
        self.dominance_since.clear();
    }
}

/// Required sustained-dominance duration given whether the current primary
/// is still "good" (`Final > 50`).
pub fn required_duration_s(current_is_good: bool, restore_min_duration_s: f64, fail_min_duration_s: f64) -> f64 {
    if current_is_good {
        restore_min_duration_s
    } else {
        fail_min_duration_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn dominance_starts_and_evicts_others() {
        let mut tracker = DominanceTracker::new();
        let t0 = Instant::now();
        tracker.observe("m2", 15.0, 10.0, false, t0);
        assert!(tracker.duration_s("m2", t0).is_some());

        tracker.observe("m3", 12.0, 10.0, false, t0);
        assert!(tracker.duration_s("m2", t0).is_none());
        assert!(tracker.duration_s("m3", t0).is_some());
    }

    #[test]
    fn insufficient_margin_clears_dominance() {
        let mut tracker = DominanceTracker::new();
        let t0 = Instant::now();
        tracker.observe("m2", 15.0, 10.0, false, t0);
        tracker.observe("m2", 3.0, 10.0, false, t0);
        assert!(tracker.duration_s("m2", t0).is_none());
    }

    #[test]
    fn duration_accumulates_over_time() {
        let mut tracker = DominanceTracker::new();
        let t0 = Instant::now();
        tracker.observe("m2", 15.0, 10.0, false, t0);
        let t1 = t0 + Duration::from_secs(3);
        tracker.observe("m2", 15.0, 10.0, false, t1);
        let dur = tracker.duration_s("m2", t1).unwrap();
        assert!((dur - 3.0).abs() < 0.01);
    }

    #[test]
    fn required_duration_switches_on_current_health() {
        assert_eq!(required_duration_s(true, 15.0, 5.0), 15.0);
        assert_eq!(required_duration_s(false, 15.0, 5.0), 5.0);
    }
}
