//! Scalar Lamport clock.

/// Monotonic per-peer event counter.
///
/// `tick` before every send and before entering the critical section;
/// `observe` on every receive, before the tick that accounts for handling
/// it. The observe-then-tick pattern yields the standard Lamport property:
/// if a send happens-before a receive, the send timestamp is strictly
/// smaller than the receiver's clock afterwards.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct LamportClock {
    time: u64,
}

impl LamportClock {
    #[must_use]
    pub const fn new() -> Self {
        Self { time: 0 }
    }

    /// Current value, without advancing.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.time
    }

    /// Advance for a local event. Returns the new time.
    pub fn tick(&mut self) -> u64 {
        self.time += 1;
        self.time
    }

    /// Merge an incoming timestamp. Never moves the clock backwards.
    pub fn observe(&mut self, timestamp: u64) {
        self.time = self.time.max(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_advances_by_one() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.now(), 2);
    }

    #[test]
    fn test_observe_takes_the_maximum() {
        let mut clock = LamportClock::new();
        clock.tick();
        clock.tick();
        clock.observe(7);
        assert_eq!(clock.now(), 7);
        clock.observe(3);
        assert_eq!(clock.now(), 7);
    }

    #[test]
    fn test_observe_then_tick_exceeds_the_message() {
        // The receive discipline: after handling a message with timestamp m,
        // the clock is strictly greater than m.
        let mut clock = LamportClock::new();
        clock.observe(41);
        assert!(clock.tick() > 41);
    }
}
