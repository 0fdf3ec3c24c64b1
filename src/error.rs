//! Error types for playsync.
//!
//! The decision functions never fail; errors only come from loading
//! configuration, installing logging, and the threaded render loop.

use thiserror::Error;

/// Main error type for playsync
#[derive(Error, Debug)]
pub enum Error {
    /// Settings file could not be read
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid TOML for `Settings`
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// An option value is outside its valid range
    #[error("Invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Render thread failed or disconnected
    #[error("Thread error: {0}")]
    Thread(String),

    /// Audio output device errors
    #[cfg(feature = "audio-output")]
    #[error("Audio output error: {0}")]
    AudioOutput(#[from] crate::audio::AudioOutputError),
}

/// Convenience Result type using playsync Error
pub type Result<T> = std::result::Result<T, Error>;
