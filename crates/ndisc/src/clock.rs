//! Injected monotonic time source.
//!
//! Every "now" the engine reads goes through [`MonotonicClock`], so tests
//! advance time deterministically with [`ManualClock`] while production
//! uses [`StartupClock`]. Timestamps are signed 32-bit seconds; the engine
//! widens to 64 bits before any addition.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// A monotonically non-decreasing seconds counter.
///
/// The zero point is arbitrary (process start, boot, a test's choice);
/// only differences matter.
pub trait MonotonicClock: Send + Sync {
    /// Current monotonic time in whole seconds.
    fn now(&self) -> i32;
}

// ════════════════════════════════════════════════════════════════════════════
// STARTUP CLOCK
// ════════════════════════════════════════════════════════════════════════════

/// Seconds elapsed since the clock was created, saturating at `i32::MAX`.
#[derive(Debug)]
pub struct StartupClock {
    origin: Instant,
}

impl StartupClock {
    #[must_use]
    pub fn new() -> Self {
        StartupClock { origin: Instant::now() }
    }
}

impl Default for StartupClock {
    fn default() -> Self {
        StartupClock::new()
    }
}

impl MonotonicClock for StartupClock {
    fn now(&self) -> i32 {
        self.origin.elapsed().as_secs().min(i32::MAX as u64) as i32
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MANUAL CLOCK
// ════════════════════════════════════════════════════════════════════════════

/// A clock that only moves when told to. For tests.
///
/// Shared freely via `Arc`; `set`/`advance` take `&self`.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: i32) -> Self {
        ManualClock { now: AtomicI64::new(i64::from(start)) }
    }

    /// Jump to an absolute second. Going backwards is not checked; tests
    /// that do so are testing themselves.
    pub fn set(&self, now: i32) {
        self.now.store(i64::from(now), Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: i32) {
        self.now.fetch_add(i64::from(secs), Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> i32 {
        self.now.load(Ordering::SeqCst) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now(), 100);
        clock.advance(59);
        assert_eq!(clock.now(), 159);
        clock.set(1000);
        assert_eq!(clock.now(), 1000);
    }

    #[test]
    fn test_startup_clock_starts_near_zero() {
        let clock = StartupClock::new();
        let now = clock.now();
        assert!((0..=1).contains(&now), "startup clock read {}", now);
    }

    #[test]
    fn test_clock_is_object_safe() {
        let clock: std::sync::Arc<dyn MonotonicClock> = std::sync::Arc::new(ManualClock::new(5));
        assert_eq!(clock.now(), 5);
    }
}
