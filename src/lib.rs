//! playsync: timing and buffering core of a media player.
//!
//! Decides when playback may start or must pause to rebuffer, keeps video
//! in step with an audio-driven reference clock, and steps an adaptive
//! bitrate ladder. Demuxing, decoding and rendering live outside this crate
//! and talk to it through `Capacity`, `FrameSource` and `VideoOutput`.

pub mod adaptation;
#[cfg(feature = "audio-output")]
pub mod audio;
pub mod buffering;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod playback;

pub use adaptation::{AdaptationPolicy, BitRateState, BitRateSwitch, LivePlaybackRate};
pub use buffering::{Capacity, CapacityCell, CapacitySnapshot, LoadingPolicy, LoadingState};
pub use config::{PlayerOptions, SessionOverrides, Settings};
pub use crate::core::{MediaType, Seconds};
pub use error::{Error, Result};
pub use playback::{
    FrameSource, FrameTiming, PlaybackSession, PlaybackState, ReferenceClock, RenderLoop,
    SyncAction, SyncDecision, VideoClockSynchronizer, VideoOutput, VideoSyncPolicy,
};
