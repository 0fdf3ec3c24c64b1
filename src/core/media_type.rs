//! Media stream kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of elementary stream a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Subtitle,
}

impl MediaType {
    pub fn is_audio(self) -> bool {
        matches!(self, MediaType::Audio)
    }

    pub fn is_video(self) -> bool {
        matches!(self, MediaType::Video)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Subtitle => "subtitle",
        };
        f.write_str(name)
    }
}
