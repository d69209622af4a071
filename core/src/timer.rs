//! Single-shot timers driven by an explicit clock.
//!
//! Timers never fire on their own. Owners call [`Timer::poll`] with the
//! current instant (usually from a `tick`) and act when it returns true.
//! Starting a running timer moves its deadline; stopping is idempotent.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Timer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// (Re)start with the current interval.
    pub fn start(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// (Re)start with a new interval, which becomes the current one.
    pub fn start_with(&mut self, now: Instant, interval: Duration) {
        self.interval = interval;
        self.start(now);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once() {
        let t0 = Instant::now();
        let mut timer = Timer::new(Duration::from_millis(100));
        timer.start(t0);
        assert!(!timer.poll(t0 + Duration::from_millis(99)));
        assert!(timer.poll(t0 + Duration::from_millis(100)));
        assert!(!timer.poll(t0 + Duration::from_millis(200)));
        assert!(!timer.is_active());
    }

    #[test]
    fn test_restart_moves_deadline() {
        let t0 = Instant::now();
        let mut timer = Timer::new(Duration::from_millis(100));
        timer.start(t0);
        timer.start(t0 + Duration::from_millis(80));
        assert!(!timer.poll(t0 + Duration::from_millis(150)));
        assert!(timer.poll(t0 + Duration::from_millis(180)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let t0 = Instant::now();
        let mut timer = Timer::new(Duration::from_millis(10));
        timer.stop();
        timer.start(t0);
        timer.stop();
        timer.stop();
        assert!(!timer.poll(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_start_with_changes_interval() {
        let t0 = Instant::now();
        let mut timer = Timer::new(Duration::from_millis(500));
        timer.start_with(t0, Duration::from_millis(100));
        assert_eq!(timer.interval(), Duration::from_millis(100));
        assert!(timer.poll(t0 + Duration::from_millis(100)));
    }
}
