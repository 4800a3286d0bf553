use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Clock abstraction for scheduling, deadlines and telemetry timestamps.
///
/// - now(): returns a monotonic Instant (deadlines, elapsed time)
/// - epoch_ms(): wall-clock milliseconds since the Unix epoch (message timestamps)
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - ms_since(): helper to compute elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> i64;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }
}

/// Default, real-time clock backed by `Instant` and `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> i64 {
        // A system clock set before 1970 reports 0 rather than failing.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(i64::MAX as u128) as i64)
            .unwrap_or(0)
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

pub mod manual {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock whose time can be advanced manually.
    ///
    /// now() = origin + offset, epoch_ms() = base_epoch_ms + offset.
    /// sleep(d) advances internal time by d without actually sleeping.
    /// Clones share the same offset.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        origin: Instant,
        base_epoch_ms: i64,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self::starting_at(1_700_000_000_000)
        }

        /// Start the wall clock at a fixed epoch timestamp (ms).
        pub fn starting_at(base_epoch_ms: i64) -> Self {
            Self {
                origin: Instant::now(),
                base_epoch_ms,
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Set the absolute offset relative to origin.
        pub fn set_offset(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = d;
            }
        }

        fn offset(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + self.offset()
        }

        fn epoch_ms(&self) -> i64 {
            self.base_epoch_ms
                .saturating_add(self.offset().as_millis().min(i64::MAX as u128) as i64)
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn advance_moves_both_time_bases() {
            let clock = ManualClock::starting_at(1_000);
            let t0 = clock.now();
            clock.advance(Duration::from_millis(250));
            assert_eq!(clock.ms_since(t0), 250);
            assert_eq!(clock.epoch_ms(), 1_250);
        }

        #[test]
        fn clones_share_offset() {
            let a = ManualClock::new();
            let b = a.clone();
            a.sleep(Duration::from_secs(2));
            assert_eq!(a.now(), b.now());
        }
    }
}
