//! Time sources — wall clock for cron schedules, monotonic for intervals.
//!
//! The two must never be conflated: interval deadlines are anchored on the
//! monotonic reader so a wall-clock jump (NTP step, DST) cannot make an
//! interval job fire early or pile up.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Supplies `wall_now` (unix seconds) and `mono_now` (seconds since an
/// anchor chosen at construction).
#[derive(Clone, Debug)]
pub struct Clock {
    mono_anchor: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            mono_anchor: Instant::now(),
        }
    }

    /// Current wall-clock time in whole unix seconds.
    pub fn wall_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Seconds elapsed since this clock was created. Never goes backwards.
    pub fn mono_now(&self) -> f64 {
        self.mono_anchor.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_now_is_recent() {
        let clock = Clock::new();
        // 2020-01-01T00:00:00Z
        assert!(clock.wall_now() > 1_577_836_800);
    }

    #[test]
    fn test_mono_now_never_regresses() {
        let clock = Clock::new();
        let a = clock.mono_now();
        let b = clock.mono_now();
        let c = clock.mono_now();
        assert!(b >= a);
        assert!(c >= b);
    }

    #[test]
    fn test_mono_starts_near_zero() {
        let clock = Clock::new();
        assert!(clock.mono_now() < 1.0);
    }
}
