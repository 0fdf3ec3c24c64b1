pub mod clock;
pub mod engine;
pub mod session;
pub mod state;
pub mod sync;

pub use clock::{ClockAnchor, HostTime, ManualHostTime, MonotonicHostTime, ReferenceClock};
pub use engine::{
    FrameSource, RenderCommand, RenderHandle, RenderLoop, RenderStats, TickOutcome, VideoOutput,
};
pub use session::PlaybackSession;
pub use state::PlaybackState;
pub use sync::{
    desired_time, FrameTiming, SyncAction, SyncDecision, SyncPhase, VideoClockSynchronizer,
    VideoSyncPolicy,
};
