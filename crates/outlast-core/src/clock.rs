//! Wall-clock source for the action engine.
//!
//! Every request reads `now` exactly once, at the start of the call, so all
//! stages of one action agree on the time. Tests swap in a [`ManualClock`]
//! to drive cooldowns, respawns, and rest expiry deterministically.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Millisecond resolution.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// A clock stopped at `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move forward by `by`. Saturates instead of overflowing.
    pub fn advance(&self, by: Duration) {
        let step = by.num_milliseconds();
        let mut current = self.millis.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(step);
            match self
                .millis
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn manual_clock_stands_still() {
        let clock = ManualClock::new(t0());
        assert_eq!(clock.now(), t0());
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn manual_clock_advances_and_jumps() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::seconds(61));
        assert_eq!(clock.now().timestamp(), 1_700_000_061);
        clock.advance(Duration::milliseconds(500));
        assert_eq!(clock.now().timestamp_millis(), 1_700_000_061_500);
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn system_clock_is_recent() {
        assert!(SystemClock.now() > t0());
    }
}
