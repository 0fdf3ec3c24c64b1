//! cpal audio output feeding the reference clock.
//!
//! Audio is the master clock: every output callback advances the stream
//! position by the duration of the buffer it just filled and re-anchors the
//! shared `ReferenceClock` there. Video reads that clock and never writes it.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, StreamConfig};
use crossbeam::atomic::AtomicCell;
use tracing::{error, info};

use crate::core::time::{self, Seconds};
use crate::playback::clock::ReferenceClock;

/// Error type for audio output
#[derive(Debug)]
pub enum AudioOutputError {
    DefaultConfig(cpal::DefaultStreamConfigError),
    BuildStream(cpal::BuildStreamError),
    PlayStream(cpal::PlayStreamError),
    PauseStream(cpal::PauseStreamError),
    NoDevice,
}

impl std::fmt::Display for AudioOutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioOutputError::DefaultConfig(e) => write!(f, "cpal default config error: {}", e),
            AudioOutputError::BuildStream(e) => write!(f, "cpal build stream error: {}", e),
            AudioOutputError::PlayStream(e) => write!(f, "cpal play stream error: {}", e),
            AudioOutputError::PauseStream(e) => write!(f, "cpal pause stream error: {}", e),
            AudioOutputError::NoDevice => write!(f, "No audio device available"),
        }
    }
}

impl std::error::Error for AudioOutputError {}

impl From<cpal::DefaultStreamConfigError> for AudioOutputError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioOutputError::DefaultConfig(err)
    }
}

impl From<cpal::BuildStreamError> for AudioOutputError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioOutputError::BuildStream(err)
    }
}

impl From<cpal::PlayStreamError> for AudioOutputError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioOutputError::PlayStream(err)
    }
}

impl From<cpal::PauseStreamError> for AudioOutputError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioOutputError::PauseStream(err)
    }
}

/// Supplier of interleaved f32 samples for the output callback.
pub trait SampleSource: Send + 'static {
    /// Fill `buffer` completely; write silence when nothing is decoded.
    fn fill(&mut self, buffer: &mut [f32], channels: u16, sample_rate: u32);
}

/// Outputs silence. Keeps the clock running without decoded audio.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silence;

impl SampleSource for Silence {
    fn fill(&mut self, buffer: &mut [f32], _channels: u16, _sample_rate: u32) {
        buffer.fill(0.0);
    }
}

/// Playback time covered by `samples` interleaved samples.
pub fn buffer_duration(samples: usize, channels: u16, sample_rate: u32) -> Seconds {
    let frames_per_second = sample_rate as f64 * channels as f64;
    if frames_per_second > 0.0 {
        samples as f64 / frames_per_second
    } else {
        0.0
    }
}

/// Default output device driving a `ReferenceClock`.
pub struct AudioOutputClock {
    _host: Host,
    device: Device,
    stream_config: StreamConfig,
    clock: ReferenceClock,
    position: Arc<AtomicCell<Seconds>>,
    latency: Arc<AtomicCell<Seconds>>,
    stream: Option<cpal::Stream>,
}

impl AudioOutputClock {
    /// Open the default output device.
    pub fn new(clock: ReferenceClock) -> Result<Self, AudioOutputError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioOutputError::NoDevice)?;
        let default_config = device.default_output_config()?;
        let stream_config = StreamConfig::from(default_config);
        info!(
            "audio output: {} Hz, {} channels",
            stream_config.sample_rate.0, stream_config.channels
        );

        Ok(Self {
            _host: host,
            device,
            stream_config,
            clock,
            position: Arc::new(AtomicCell::new(0.0)),
            latency: Arc::new(AtomicCell::new(0.0)),
            stream: None,
        })
    }

    /// Start output at `position`, pulling samples from `source`.
    pub fn start(
        &mut self,
        position: Seconds,
        mut source: impl SampleSource,
    ) -> Result<(), AudioOutputError> {
        self.stop();
        self.position.store(position);
        self.clock.set_position(position);

        let clock = self.clock.clone();
        let position = Arc::clone(&self.position);
        let latency = Arc::clone(&self.latency);
        let channels = self.stream_config.channels;
        let sample_rate = self.stream_config.sample_rate.0;

        let stream = self.device.build_output_stream(
            &self.stream_config,
            move |data: &mut [f32], info: &cpal::OutputCallbackInfo| {
                source.fill(data, channels, sample_rate);

                let stamp = info.timestamp();
                if let Some(delay) = stamp.playback.duration_since(&stamp.callback) {
                    latency.store(time::from_duration(delay));
                }
                let now = position.load() + buffer_duration(data.len(), channels, sample_rate);
                position.store(now);
                clock.set_position(now);
            },
            |err| error!("audio stream error: {}", err),
            None,
        )?;

        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), AudioOutputError> {
        if let Some(stream) = &self.stream {
            stream.pause()?;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), AudioOutputError> {
        if let Some(stream) = &self.stream {
            stream.play()?;
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.stream = None;
    }

    /// Move the output position; the clock follows on the next callback.
    pub fn seek(&mut self, position: Seconds) {
        self.position.store(position);
        self.clock.set_position(position);
    }

    /// Seconds of audio written so far
    pub fn position(&self) -> Seconds {
        self.position.load()
    }

    /// Latest callback-to-playback delay reported by the device
    pub fn output_latency(&self) -> Seconds {
        self.latency.load()
    }

    pub fn clock(&self) -> &ReferenceClock {
        &self.clock
    }
}
