//! Injected time capability.
//!
//! The core never reads the OS clock directly: the sequencer and the CT
//! front-end take a [`TimeSource`] so tests can freeze time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Capability for reading the current time.
pub trait TimeSource: Send + Sync {
    /// Current unix time in milliseconds.
    fn now_millis(&self) -> u64;

    /// Current unix time in nanoseconds.
    fn now_nanos(&self) -> i64;
}

/// Production time source reading the OS clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn now_nanos(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64
    }
}

/// Deterministic time source for tests. The clock only moves when told to.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    nanos: AtomicI64,
}

impl FixedTimeSource {
    /// Create a frozen clock at the given unix millisecond timestamp.
    pub fn at_millis(millis: u64) -> Self {
        Self {
            nanos: AtomicI64::new(millis as i64 * 1_000_000),
        }
    }

    /// Move the clock to a new millisecond timestamp.
    pub fn set_millis(&self, millis: u64) {
        self.nanos.store(millis as i64 * 1_000_000, Ordering::SeqCst);
    }

    /// Advance the clock by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.nanos
            .fetch_add(millis as i64 * 1_000_000, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now_millis(&self) -> u64 {
        (self.nanos.load(Ordering::SeqCst) / 1_000_000) as u64
    }

    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_time_source_is_frozen() {
        let ts = FixedTimeSource::at_millis(12_345);
        assert_eq!(ts.now_millis(), 12_345);
        assert_eq!(ts.now_nanos(), 12_345_000_000);
        assert_eq!(ts.now_millis(), 12_345);
    }

    #[test]
    fn test_fixed_time_source_advances() {
        let ts = FixedTimeSource::at_millis(1_000);
        ts.advance_millis(500);
        assert_eq!(ts.now_millis(), 1_500);
        ts.set_millis(99);
        assert_eq!(ts.now_millis(), 99);
    }

    #[test]
    fn test_system_time_source_is_monotonic_enough() {
        let ts = SystemTimeSource;
        let a = ts.now_nanos();
        let b = ts.now_nanos();
        assert!(b >= a);
        assert!(ts.now_millis() > 1_600_000_000_000, "should be after 2020");
    }
}
