//! Rate limiting for manually-triggered sync.
//!
//! The clock is injected so tests control time directly instead of sleeping.

/// Minimum-interval gate for sync passes.
#[derive(Debug, Clone)]
pub struct SyncThrottle {
    last_run_at: Option<u64>,
    min_interval: u64,
}

impl SyncThrottle {
    /// A throttle requiring `min_interval` seconds between passes.
    pub fn new(min_interval: u64) -> Self {
        Self {
            last_run_at: None,
            min_interval,
        }
    }

    /// Try to start a pass at `now`. Returns true and records the run when
    /// enough time has elapsed since the last accepted pass.
    pub fn try_begin(&mut self, now: u64) -> bool {
        if let Some(last) = self.last_run_at {
            if now.saturating_sub(last) < self.min_interval {
                return false;
            }
        }
        self.last_run_at = Some(now);
        true
    }

    /// Forget the last run, letting the next attempt through.
    pub fn reset(&mut self) {
        self.last_run_at = None;
    }

    /// When the last accepted pass started, if any.
    pub fn last_run_at(&self) -> Option<u64> {
        self.last_run_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_allowed() {
        let mut throttle = SyncThrottle::new(60);
        assert!(throttle.try_begin(100));
    }

    #[test]
    fn test_second_attempt_within_interval_denied() {
        let mut throttle = SyncThrottle::new(60);
        assert!(throttle.try_begin(100));
        assert!(!throttle.try_begin(159));
        assert!(throttle.try_begin(160));
    }

    #[test]
    fn test_denied_attempt_does_not_push_window() {
        let mut throttle = SyncThrottle::new(60);
        assert!(throttle.try_begin(100));
        assert!(!throttle.try_begin(150));
        // Window still counts from 100, not 150.
        assert!(throttle.try_begin(160));
    }

    #[test]
    fn test_reset_reopens_gate() {
        let mut throttle = SyncThrottle::new(60);
        assert!(throttle.try_begin(100));
        throttle.reset();
        assert!(throttle.try_begin(101));
    }

    #[test]
    fn test_clock_going_backwards_is_throttled() {
        let mut throttle = SyncThrottle::new(60);
        assert!(throttle.try_begin(100));
        assert!(!throttle.try_begin(50));
    }
}
