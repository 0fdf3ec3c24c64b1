//! Stream-time representation.
//! Playback positions, buffered durations and clock offsets are all seconds (f64).

use std::time::Duration;

/// Time in seconds on the stream timeline.
/// This is the core time representation throughout the crate
pub type Seconds = f64;

/// Time constants for conversions
pub mod constants {
    use super::Seconds;

    pub const MILLIS_PER_SECOND: Seconds = 1_000.0;
    pub const MICROS_PER_SECOND: Seconds = 1_000_000.0;

    /// Highest display refresh rate the synchronizer distinguishes.
    pub const MAX_REFRESH_RATE: Seconds = 120.0;
}

/// Convert a `Duration` to seconds
#[inline]
pub fn from_duration(duration: Duration) -> Seconds {
    duration.as_secs_f64()
}

/// Convert seconds to a `Duration`, clamping negative values to zero
#[inline]
pub fn to_duration(seconds: Seconds) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}

/// Convert milliseconds to seconds
#[inline]
pub fn from_millis(millis: i64) -> Seconds {
    millis as Seconds / constants::MILLIS_PER_SECOND
}

/// Convert seconds to whole milliseconds (truncating)
#[inline]
pub fn to_millis(seconds: Seconds) -> i64 {
    (seconds * constants::MILLIS_PER_SECOND) as i64
}

/// Convert microseconds to seconds
#[inline]
pub fn from_micros(micros: i64) -> Seconds {
    micros as Seconds / constants::MICROS_PER_SECOND
}

/// Duration of a single frame at the given frame rate.
/// Returns `None` for a non-positive or non-finite rate.
#[inline]
pub fn frame_interval(fps: f32) -> Option<Seconds> {
    if fps.is_finite() && fps > 0.0 {
        Some(1.0 / fps as Seconds)
    } else {
        None
    }
}

/// Smallest positive lead the synchronizer treats as "ahead of the clock".
#[inline]
pub fn refresh_tolerance() -> Seconds {
    1.0 / constants::MAX_REFRESH_RATE
}

/// Display refresh rate needed to present `fps` content without judder:
/// the frame rate rounded up, doubled.
#[inline]
pub fn display_frame_rate(fps: f32) -> u32 {
    if fps.is_finite() && fps > 0.0 {
        (fps.ceil() as u32) << 1
    } else {
        0
    }
}

/// Format a position as HH:MM:SS.mmm; negative positions get a leading '-'
pub fn format_time(seconds: Seconds) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let total_millis = to_millis(seconds.abs());
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let secs = (total_millis / 1_000) % 60;
    let millis = total_millis % 1_000;

    format!("{}{:02}:{:02}:{:02}.{:03}", sign, hours, minutes, secs, millis)
}
