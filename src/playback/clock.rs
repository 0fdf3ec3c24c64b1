//! Reference clock for audio/video synchronization.
//!
//! The clock free-runs at real-time rate between position updates, so the
//! render loop can read a fresh time every refresh even though the audio
//! renderer only reports its position once per callback.

use std::sync::Arc;
use std::time::Instant;

use crossbeam::atomic::AtomicCell;

use crate::core::time::{self, Seconds};

/// Monotonic host time source, in seconds from an arbitrary origin.
pub trait HostTime: Send + Sync {
    fn now(&self) -> Seconds;
}

/// Host time backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicHostTime {
    origin: Instant,
}

impl MonotonicHostTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicHostTime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTime for MonotonicHostTime {
    fn now(&self) -> Seconds {
        time::from_duration(self.origin.elapsed())
    }
}

/// Host time that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualHostTime {
    now: Arc<AtomicCell<Seconds>>,
}

impl ManualHostTime {
    pub fn new(start: Seconds) -> Self {
        Self {
            now: Arc::new(AtomicCell::new(start)),
        }
    }

    pub fn set(&self, now: Seconds) {
        self.now.store(now);
    }

    pub fn advance(&self, seconds: Seconds) {
        debug_assert!(seconds >= 0.0, "host time cannot run backward");
        self.now.store(self.now.load() + seconds);
    }
}

impl HostTime for ManualHostTime {
    fn now(&self) -> Seconds {
        self.now.load()
    }
}

/// Position anchor: stream position and the host time it was recorded at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    pub position_time: Seconds,
    pub host_time: Seconds,
}

/// Shared reference clock (typically fed by audio output).
///
/// One owner calls `set_position`; any number of clones read `current_time`.
/// The anchor pair is swapped in a single store, so readers never mix a new
/// position with an old host sample.
#[derive(Clone)]
pub struct ReferenceClock {
    host: Arc<dyn HostTime>,
    anchor: Arc<AtomicCell<ClockAnchor>>,
}

impl ReferenceClock {
    /// Create a clock at position zero on the real monotonic host clock
    pub fn new() -> Self {
        Self::with_host_time(Arc::new(MonotonicHostTime::new()))
    }

    /// Create a clock at position zero on the given host time source
    pub fn with_host_time(host: Arc<dyn HostTime>) -> Self {
        let anchor = ClockAnchor {
            position_time: 0.0,
            host_time: host.now(),
        };
        Self {
            host,
            anchor: Arc::new(AtomicCell::new(anchor)),
        }
    }

    /// Current stream time: anchored position plus host time elapsed since.
    pub fn current_time(&self) -> Seconds {
        let anchor = self.anchor.load();
        anchor.position_time + (self.host.now() - anchor.host_time)
    }

    /// Re-anchor the clock at `position` as of now (called by the master
    /// clock owner only).
    pub fn set_position(&self, position: Seconds) {
        self.anchor.store(ClockAnchor {
            position_time: position,
            host_time: self.host.now(),
        });
    }

    /// Last published anchor
    pub fn anchor(&self) -> ClockAnchor {
        self.anchor.load()
    }

    /// Current host time of the clock's source
    pub fn host_now(&self) -> Seconds {
        self.host.now()
    }
}

impl Default for ReferenceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceClock")
            .field("anchor", &self.anchor())
            .field("current_time", &self.current_time())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_clock(start: Seconds) -> (ManualHostTime, ReferenceClock) {
        let host = ManualHostTime::new(start);
        let clock = ReferenceClock::with_host_time(Arc::new(host.clone()));
        (host, clock)
    }

    #[test]
    fn test_starts_at_zero() {
        let (_, clock) = manual_clock(100.0);
        assert_eq!(clock.current_time(), 0.0);
        assert_eq!(clock.anchor().host_time, 100.0);
    }

    #[test]
    fn test_free_runs_between_updates() {
        let (host, clock) = manual_clock(0.0);
        clock.set_position(10.0);
        host.advance(0.25);
        assert!((clock.current_time() - 10.25).abs() < 1e-12);
        host.advance(0.75);
        assert!((clock.current_time() - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_position_reanchors() {
        let (host, clock) = manual_clock(5.0);
        host.advance(2.0);
        clock.set_position(42.0);
        let anchor = clock.anchor();
        assert_eq!(anchor.position_time, 42.0);
        assert_eq!(anchor.host_time, 7.0);
        assert_eq!(clock.current_time(), 42.0);

        // jumping backward is allowed through set_position
        clock.set_position(1.0);
        assert_eq!(clock.current_time(), 1.0);
    }

    #[test]
    fn test_clones_share_anchor() {
        let (host, clock) = manual_clock(0.0);
        let reader = clock.clone();
        clock.set_position(3.0);
        host.advance(1.0);
        assert_eq!(reader.current_time(), 4.0);
    }

    #[test]
    fn test_monotonic_host_never_goes_backward() {
        let clock = ReferenceClock::new();
        clock.set_position(1.0);
        let mut last = clock.current_time();
        for _ in 0..1000 {
            let now = clock.current_time();
            assert!(now >= last);
            last = now;
        }
        assert!(last >= 1.0);
    }
}
