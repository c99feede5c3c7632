//! Fixed-interval cooperative ticker
//!
//! The update loop asks every frame whether a tick is due; no background
//! timer thread exists. Stopping is idempotent, and a stopped ticker is
//! never due, so callbacks scheduled around a tick cannot fire after the
//! owning operation has settled.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    /// Create a stopped ticker with the given interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Start (or restart) ticking; the first tick is due immediately
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    /// Stop ticking. Safe to call any number of times.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Whether a tick is due. Consumes the tick and schedules the next one.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(at) if now >= at => {
                self.next_due = Some(now + self.interval);
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
    fn test_stopped_ticker_is_never_due() {
        let mut ticker = Ticker::new(Duration::from_millis(200));
        assert!(!ticker.is_running());
        assert!(!ticker.due(Instant::now()));
    }

    #[test]
    fn test_first_tick_due_immediately_after_start() {
        let mut ticker = Ticker::new(Duration::from_millis(200));
        let now = Instant::now();

        ticker.start(now);
        assert!(ticker.is_running());
        assert!(ticker.due(now));
        // Consumed: not due again until the interval elapses.
        assert!(!ticker.due(now));
    }

    #[test]
    fn test_tick_cadence() {
        let mut ticker = Ticker::new(Duration::from_millis(200));
        let start = Instant::now();

        ticker.start(start);
        assert!(ticker.due(start));
        assert!(!ticker.due(start + Duration::from_millis(100)));
        assert!(ticker.due(start + Duration::from_millis(200)));
        assert!(ticker.due(start + Duration::from_millis(400)));
    }

    #[test]
    fn test_stop_is_idempotent_and_kills_pending_tick() {
        let mut ticker = Ticker::new(Duration::from_millis(200));
        let now = Instant::now();

        ticker.start(now);
        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());
        assert!(!ticker.due(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_restart_after_stop() {
        let mut ticker = Ticker::new(Duration::from_millis(200));
        let now = Instant::now();

        ticker.start(now);
        assert!(ticker.due(now));
        ticker.stop();

        let later = now + Duration::from_secs(1);
        ticker.start(later);
        assert!(ticker.due(later));
    }
}
