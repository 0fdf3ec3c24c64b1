//! Adaptive bitrate stepping.
//!
//! Steps one rung up or down the bitrate ladder when the frame buffer
//! clearly has room (or clearly does not), and never more often than every
//! half `max_buffer_duration`.

use tracing::{debug, info};

use crate::config::PlayerOptions;
use crate::core::time::Seconds;

/// A recorded switch to `bit_rate` at host time `time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitRateSample {
    pub time: Seconds,
    pub bit_rate: i64,
}

/// Adaptation inputs for one video track.
#[derive(Debug, Clone, PartialEq)]
pub struct BitRateState {
    /// Switch history, oldest first
    pub samples: Vec<BitRateSample>,
    /// Available bit rates, ascending
    pub bit_rates: Vec<i64>,
    pub fps: f32,
    /// Decoded frames currently buffered
    pub loaded_count: usize,
    pub is_playable: bool,
}

impl BitRateState {
    pub fn new(bit_rates: Vec<i64>, fps: f32) -> Self {
        debug_assert!(
            bit_rates.windows(2).all(|w| w[0] <= w[1]),
            "bit rates must be ascending"
        );
        Self {
            samples: Vec::new(),
            bit_rates,
            fps,
            loaded_count: 0,
            is_playable: false,
        }
    }

    /// Append a switch to the history.
    pub fn record(&mut self, time: Seconds, bit_rate: i64) {
        self.samples.push(BitRateSample { time, bit_rate });
    }

    pub fn last_sample(&self) -> Option<&BitRateSample> {
        self.samples.last()
    }

    pub fn current_bit_rate(&self) -> Option<i64> {
        self.last_sample().map(|s| s.bit_rate)
    }
}

/// Recommended switch from one bit rate to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRateSwitch {
    pub from: i64,
    pub to: i64,
}

impl BitRateSwitch {
    pub fn is_up(&self) -> bool {
        self.to > self.from
    }
}

/// Strategy recommending a bitrate change. `None` means keep the current
/// rate, which is never an error.
pub trait AdaptationPolicy: Send {
    fn adapt(
        &self,
        options: &PlayerOptions,
        state: Option<&BitRateState>,
        now: Seconds,
    ) -> Option<BitRateSwitch>;
}

impl<F> AdaptationPolicy for F
where
    F: Fn(&PlayerOptions, Option<&BitRateState>, Seconds) -> Option<BitRateSwitch> + Send,
{
    fn adapt(
        &self,
        options: &PlayerOptions,
        state: Option<&BitRateState>,
        now: Seconds,
    ) -> Option<BitRateSwitch> {
        self(options, state, now)
    }
}

/// One-rung stepping driven by buffered frame count.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAdaptationPolicy;

impl AdaptationPolicy for DefaultAdaptationPolicy {
    fn adapt(
        &self,
        options: &PlayerOptions,
        state: Option<&BitRateState>,
        now: Seconds,
    ) -> Option<BitRateSwitch> {
        evaluate_bitrate_adaptation(state, options.max_buffer_duration, now)
    }
}

/// Decide whether to step the bitrate.
///
/// Abstains when there is no history, when the last switch is too recent,
/// when the current rate is not on the ladder, when the buffer signal
/// disagrees with playability, or when already at the end of the ladder.
pub fn evaluate_bitrate_adaptation(
    state: Option<&BitRateState>,
    max_buffer_duration: Seconds,
    now: Seconds,
) -> Option<BitRateSwitch> {
    let state = state?;
    let last = state.last_sample()?;
    if now - last.time < max_buffer_duration / 2.0 {
        return None;
    }
    let index = state.bit_rates.iter().position(|&rate| rate == last.bit_rate)?;

    let threshold = (state.fps as f64 * max_buffer_duration / 2.0) as usize;
    let is_up = state.loaded_count > threshold;
    if is_up != state.is_playable {
        debug!(
            loaded_count = state.loaded_count,
            threshold,
            is_playable = state.is_playable,
            "bitrate signals disagree, keeping {}",
            last.bit_rate
        );
        return None;
    }

    let to = if is_up {
        state.bit_rates.get(index + 1)
    } else {
        index.checked_sub(1).and_then(|i| state.bit_rates.get(i))
    };
    let switch = to.map(|&to| BitRateSwitch {
        from: last.bit_rate,
        to,
    });
    if let Some(switch) = switch {
        info!("bitrate switch recommended: {} -> {}", switch.from, switch.to);
    }
    switch
}
