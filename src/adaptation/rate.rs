//! Live playback-rate adjustment.
//!
//! For live streams the buffer can drift away from the target; nudging the
//! playback rate drains or refills it without a visible seek.

use crate::buffering::loading::LoadingState;
use crate::config::PlayerOptions;

/// Strategy choosing a playback rate for live streams. `None` leaves the
/// current rate alone.
pub trait LivePlaybackRate: Send {
    fn playback_rate(&self, options: &PlayerOptions, loading: &LoadingState) -> Option<f32>;
}

/// Never touches the rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedRate;

impl LivePlaybackRate for FixedRate {
    fn playback_rate(&self, _options: &PlayerOptions, _loading: &LoadingState) -> Option<f32> {
        None
    }
}

/// Speeds up when far ahead of the buffer target, slows down when under
/// half of it.
#[derive(Debug, Clone, Copy)]
pub struct BufferDrivenRate {
    /// Seconds above the preferred buffer before speeding up
    pub headroom: f64,
    pub fast_rate: f32,
    pub slow_rate: f32,
}

impl Default for BufferDrivenRate {
    fn default() -> Self {
        Self {
            headroom: 5.0,
            fast_rate: 1.2,
            slow_rate: 0.8,
        }
    }
}

impl LivePlaybackRate for BufferDrivenRate {
    fn playback_rate(&self, options: &PlayerOptions, loading: &LoadingState) -> Option<f32> {
        if loading.is_first {
            return None;
        }
        let target = options.preferred_forward_buffer_duration;
        if loading.loaded_time > target + self.headroom {
            Some(self.fast_rate)
        } else if loading.loaded_time < target / 2.0 {
            Some(self.slow_rate)
        } else {
            Some(1.0)
        }
    }
}
