//! Session configuration.
//!
//! `PlayerOptions` is an immutable value handed to each session when it is
//! created. Runtime tuning goes through `SessionOverrides`, which layers
//! optional replacements on top of the base options.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::time::Seconds;
use crate::error::{Error, Result};
use crate::logging::LoggingConfig;

/// How decoded pictures are laid out in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Flat rectangle
    #[default]
    Plane,
    /// Large curved screen in an immersive space
    Immersive,
    /// 360° equirectangular projection
    Sphere,
}

/// Stereoscopic packing of the decoded picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoMode {
    #[default]
    Mono,
    SideBySide,
    TopBottom,
}

/// Tunable playback options, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    /// Seconds of media to buffer before playback is considered ready
    pub preferred_forward_buffer_duration: Seconds,
    /// Upper bound on buffered media; also paces bitrate switches
    pub max_buffer_duration: Seconds,
    /// Fast start: begin at half the preferred buffer
    pub is_second_open: bool,
    pub is_accurate_seek: bool,
    /// Applies to short videos only
    pub is_loop_play: bool,
    /// Start playing as soon as the first buffer is ready
    pub is_auto_play: bool,
    /// Resume playing once a seek has buffered
    pub is_seeked_auto_play: bool,
    /// Fixed offset subtracted from the reference clock for video (seconds)
    pub video_delay: Seconds,
    /// Audio output latency subtracted from the reference clock (seconds)
    pub output_latency: Seconds,
    /// Audio is decoded on demand, so its queue never gates playability
    pub sync_decode_audio: bool,
    /// Video is decoded on demand, so its queue never gates playability
    pub sync_decode_video: bool,
    pub is_live: bool,
    pub start_play_time: Seconds,
    pub start_play_rate: f32,
    pub display: DisplayMode,
    pub stereo: StereoMode,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            preferred_forward_buffer_duration: 3.0,
            max_buffer_duration: 30.0,
            is_second_open: false,
            is_accurate_seek: false,
            is_loop_play: false,
            is_auto_play: false,
            is_seeked_auto_play: true,
            video_delay: 0.0,
            output_latency: 0.0,
            sync_decode_audio: false,
            sync_decode_video: false,
            is_live: false,
            start_play_time: 0.0,
            start_play_rate: 1.0,
            display: DisplayMode::Plane,
            stereo: StereoMode::Mono,
        }
    }
}

impl PlayerOptions {
    /// Check every numeric option against its valid range.
    pub fn validate(&self) -> Result<()> {
        positive(
            "preferred_forward_buffer_duration",
            self.preferred_forward_buffer_duration,
        )?;
        positive("max_buffer_duration", self.max_buffer_duration)?;
        non_negative("video_delay", self.video_delay)?;
        non_negative("output_latency", self.output_latency)?;
        non_negative("start_play_time", self.start_play_time)?;
        positive("start_play_rate", self.start_play_rate as f64)?;
        Ok(())
    }

    /// Whether frames go to the flat system display layer rather than the
    /// immersive renderer.
    pub fn uses_display_layer(&self) -> bool {
        self.display == DisplayMode::Plane && self.stereo == StereoMode::Mono
    }

    /// Effective options after applying a session's runtime overrides.
    pub fn with_overrides(&self, overrides: &SessionOverrides) -> PlayerOptions {
        let mut options = self.clone();
        if let Some(value) = overrides.preferred_forward_buffer_duration {
            options.preferred_forward_buffer_duration = value;
        }
        if let Some(value) = overrides.max_buffer_duration {
            options.max_buffer_duration = value;
        }
        if let Some(value) = overrides.is_second_open {
            options.is_second_open = value;
        }
        if let Some(value) = overrides.video_delay {
            options.video_delay = value;
        }
        if let Some(value) = overrides.output_latency {
            options.output_latency = value;
        }
        if let Some(value) = overrides.sync_decode_audio {
            options.sync_decode_audio = value;
        }
        if let Some(value) = overrides.sync_decode_video {
            options.sync_decode_video = value;
        }
        options
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidOption {
            name,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidOption {
            name,
            reason: format!("must be zero or positive, got {}", value),
        })
    }
}

/// Per-session runtime replacements for a subset of `PlayerOptions`.
/// `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOverrides {
    pub preferred_forward_buffer_duration: Option<Seconds>,
    pub max_buffer_duration: Option<Seconds>,
    pub is_second_open: Option<bool>,
    pub video_delay: Option<Seconds>,
    pub output_latency: Option<Seconds>,
    pub sync_decode_audio: Option<bool>,
    pub sync_decode_video: Option<bool>,
}

impl SessionOverrides {
    pub fn is_empty(&self) -> bool {
        *self == SessionOverrides::default()
    }
}

/// Everything read from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub options: PlayerOptions,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Parse settings from TOML text and validate the options.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.options.validate()?;
        Ok(settings)
    }

    /// Read and validate a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}
