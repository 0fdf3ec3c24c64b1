//! Playback state machine.

use std::fmt;

use crate::core::time::Seconds;

/// Playback state of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackState {
    /// Opened, waiting for the first playable buffer
    Opening,
    /// First buffer is ready; waiting for `play`
    ReadyToPlay,
    /// Actively playing
    Playing,
    /// Playing was interrupted because a stream ran dry
    Buffering,
    /// Paused by the user
    Paused,
    /// Waiting for the buffer after a seek
    Seeking {
        target: Seconds,
    },
    /// Every stream reached end-of-file and drained
    Finished,
}

impl PlaybackState {
    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    /// Check if paused by the user
    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    /// Check if seeking
    pub fn is_seeking(&self) -> bool {
        matches!(self, PlaybackState::Seeking { .. })
    }

    /// Check if waiting on buffered data (open, rebuffer or seek)
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            PlaybackState::Opening | PlaybackState::Buffering | PlaybackState::Seeking { .. }
        )
    }

    /// Whether the render loop should advance video
    pub fn renders_video(&self) -> bool {
        self.is_playing()
    }

    /// Check if playback ran to the end
    pub fn is_finished(&self) -> bool {
        matches!(self, PlaybackState::Finished)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Opening
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Opening => f.write_str("opening"),
            PlaybackState::ReadyToPlay => f.write_str("ready to play"),
            PlaybackState::Playing => f.write_str("playing"),
            PlaybackState::Buffering => f.write_str("buffering"),
            PlaybackState::Paused => f.write_str("paused"),
            PlaybackState::Seeking { target } => write!(f, "seeking to {:.3}s", target),
            PlaybackState::Finished => f.write_str("finished"),
        }
    }
}
