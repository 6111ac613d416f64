use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction used by the simulator and the orchestrator pauses.
///
/// - now(): returns a monotonic Instant
/// - sleep(): sleeps for the provided duration (implementations may simulate)
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time elapsed since `epoch`, saturating at zero.
    fn since(&self, epoch: Instant) -> Duration {
        self.now().saturating_duration_since(epoch)
    }
}

/// Real-time clock backed by std::time::Instant.
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

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-util"))]
mod manual {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock whose time only moves when advanced.
    ///
    /// now() = origin + offset
    /// sleep(d) advances internal time by d without actually sleeping.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Total simulated time since creation.
        pub fn elapsed(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}
