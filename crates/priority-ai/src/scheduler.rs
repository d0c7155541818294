//! Per-entity wake time.
//!
//! The host invokes a controller once [`WakeSchedule::is_due`]; the engine
//! runs no timers of its own. A wake time of zero means nothing is scheduled.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WakeSchedule {
    wake: f64,
}

impl WakeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake_time(&self) -> f64 {
        self.wake
    }

    pub fn is_scheduled(&self) -> bool {
        self.wake > 0.0
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.is_scheduled() && self.wake <= now
    }

    /// Moves the wake time to `now + delay` if that is sooner than what is
    /// already scheduled. Returns whether it moved.
    pub fn tighten(&mut self, now: f64, delay: f64) -> bool {
        let wake = now + delay;
        if self.wake == 0.0 || wake < self.wake {
            self.wake = wake;
            true
        } else {
            false
        }
    }

    /// Unconditionally schedules `now + delay`.
    pub fn replace(&mut self, now: f64, delay: f64) {
        self.wake = now + delay;
    }

    pub fn clear(&mut self) {
        self.wake = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_request_never_postpones() {
        let mut wake = WakeSchedule::new();
        assert!(wake.tighten(10.0, 5.0));
        assert!(!wake.tighten(10.0, 8.0));
        assert_eq!(wake.wake_time(), 15.0);
        assert!(wake.tighten(11.0, 1.0));
        assert_eq!(wake.wake_time(), 12.0);
    }

    #[test]
    fn cleared_schedule_accepts_any_time() {
        let mut wake = WakeSchedule::new();
        wake.tighten(0.0, 1.0);
        wake.clear();
        assert!(!wake.is_scheduled());
        assert!(wake.tighten(50.0, 30.0));
        assert!(!wake.is_due(79.0));
        assert!(wake.is_due(80.0));
    }

    #[test]
    fn replace_can_postpone() {
        let mut wake = WakeSchedule::new();
        wake.tighten(0.0, 1.0);
        wake.replace(0.0, 9.0);
        assert_eq!(wake.wake_time(), 9.0);
    }
}
