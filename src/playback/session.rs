//! Playback session.
//!
//! Owns everything one open media item needs to make timing decisions: the
//! effective options, the pluggable policies, the reference clock, the
//! synchronizer's hysteresis and the adaptation history. The decode and
//! render layers call into it; it never calls out.

use std::sync::Arc;

use tracing::{debug, info};

use crate::adaptation::bitrate::{AdaptationPolicy, BitRateState, BitRateSwitch, DefaultAdaptationPolicy};
use crate::adaptation::rate::{FixedRate, LivePlaybackRate};
use crate::buffering::capacity::{Capacity, CapacitySnapshot};
use crate::buffering::loading::{DefaultLoadingPolicy, LoadingPolicy, LoadingState};
use crate::config::{PlayerOptions, SessionOverrides};
use crate::core::time::Seconds;
use crate::error::Result;
use crate::playback::clock::ReferenceClock;
use crate::playback::state::PlaybackState;
use crate::playback::sync::{self, FrameTiming, SyncDecision, VideoClockSynchronizer, VideoSyncPolicy};

/// Per-session decision state
pub struct PlaybackSession {
    base_options: Arc<PlayerOptions>,
    overrides: SessionOverrides,
    options: PlayerOptions,
    clock: ReferenceClock,
    loading_policy: Box<dyn LoadingPolicy>,
    sync_policy: Box<dyn VideoSyncPolicy>,
    adaptation_policy: Box<dyn AdaptationPolicy>,
    rate_policy: Box<dyn LivePlaybackRate>,
    bit_rate: Option<BitRateState>,
    state: PlaybackState,
    is_first: bool,
    is_seek: bool,
    last_loading: Option<LoadingState>,
}

impl PlaybackSession {
    /// Create a session with the default policies. The clock is positioned
    /// at `start_play_time`.
    pub fn new(options: Arc<PlayerOptions>, clock: ReferenceClock) -> Self {
        clock.set_position(options.start_play_time);
        Self {
            options: (*options).clone(),
            base_options: options,
            overrides: SessionOverrides::default(),
            clock,
            loading_policy: Box::new(DefaultLoadingPolicy),
            sync_policy: Box::new(VideoClockSynchronizer::new()),
            adaptation_policy: Box::new(DefaultAdaptationPolicy),
            rate_policy: Box::new(FixedRate),
            bit_rate: None,
            state: PlaybackState::Opening,
            is_first: true,
            is_seek: false,
            last_loading: None,
        }
    }

    pub fn with_loading_policy(mut self, policy: impl LoadingPolicy + 'static) -> Self {
        self.loading_policy = Box::new(policy);
        self
    }

    pub fn with_sync_policy(mut self, policy: impl VideoSyncPolicy + 'static) -> Self {
        self.sync_policy = Box::new(policy);
        self
    }

    pub fn with_adaptation_policy(mut self, policy: impl AdaptationPolicy + 'static) -> Self {
        self.adaptation_policy = Box::new(policy);
        self
    }

    pub fn with_rate_policy(mut self, policy: impl LivePlaybackRate + 'static) -> Self {
        self.rate_policy = Box::new(policy);
        self
    }

    /// Effective options (base plus overrides)
    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    pub fn base_options(&self) -> &Arc<PlayerOptions> {
        &self.base_options
    }

    pub fn overrides(&self) -> &SessionOverrides {
        &self.overrides
    }

    /// Replace the runtime overrides. Rejected (and not applied) if the
    /// resulting options are invalid.
    pub fn set_overrides(&mut self, overrides: SessionOverrides) -> Result<()> {
        let effective = self.base_options.with_overrides(&overrides);
        effective.validate()?;
        debug!(?overrides, "session overrides updated");
        self.overrides = overrides;
        self.options = effective;
        Ok(())
    }

    pub fn clock(&self) -> &ReferenceClock {
        &self.clock
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn last_loading(&self) -> Option<&LoadingState> {
        self.last_loading.as_ref()
    }

    /// Run the loading policy over `snapshots` and advance the state machine.
    pub fn evaluate_loading(&mut self, snapshots: &[CapacitySnapshot]) -> LoadingState {
        let loading = self
            .loading_policy
            .playable(&self.options, snapshots, self.is_first, self.is_seek);

        if snapshots.is_empty() {
            debug!("loading evaluated with no active streams");
        } else {
            self.apply_loading(&loading);
        }
        self.last_loading = Some(loading);
        loading
    }

    /// Snapshot every stream, then `evaluate_loading`.
    pub fn evaluate_streams<C: Capacity>(&mut self, streams: &[C]) -> LoadingState {
        let snapshots: Vec<CapacitySnapshot> = streams.iter().map(Capacity::snapshot).collect();
        self.evaluate_loading(&snapshots)
    }

    fn apply_loading(&mut self, loading: &LoadingState) {
        let drained = loading.is_end_of_file && loading.packet_count == 0 && loading.frame_count == 0;
        let next = if drained {
            PlaybackState::Finished
        } else if loading.is_playable {
            if self.is_first {
                debug!(progress = loading.progress, "first buffer ready");
            }
            self.is_first = false;
            self.is_seek = false;
            match self.state {
                PlaybackState::Opening if self.options.is_auto_play => PlaybackState::Playing,
                PlaybackState::Opening => PlaybackState::ReadyToPlay,
                PlaybackState::Seeking { .. } if self.options.is_seeked_auto_play => {
                    PlaybackState::Playing
                }
                PlaybackState::Seeking { .. } => PlaybackState::Paused,
                PlaybackState::Buffering => PlaybackState::Playing,
                other => other,
            }
        } else {
            match self.state {
                PlaybackState::Playing => PlaybackState::Buffering,
                other => other,
            }
        };
        self.transition(next);
    }

    fn transition(&mut self, next: PlaybackState) {
        if next != self.state {
            info!("playback state: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Start or resume playback. Returns the resulting state.
    pub fn play(&mut self) -> PlaybackState {
        if matches!(self.state, PlaybackState::ReadyToPlay | PlaybackState::Paused) {
            self.transition(PlaybackState::Playing);
        }
        self.state
    }

    /// Pause playback. Returns the resulting state.
    pub fn pause(&mut self) -> PlaybackState {
        if matches!(
            self.state,
            PlaybackState::Playing | PlaybackState::Buffering | PlaybackState::ReadyToPlay
        ) {
            self.transition(PlaybackState::Paused);
        }
        self.state
    }

    /// User seek: reposition the clock, forget accumulated lag, and wait for
    /// the buffer to refill.
    pub fn seek(&mut self, target: Seconds) {
        self.clock.set_position(target);
        self.sync_policy.reset();
        self.is_seek = true;
        self.transition(PlaybackState::Seeking { target });
    }

    /// Time video should be showing now.
    pub fn desired_video_time(&self) -> Seconds {
        sync::desired_time(&self.clock, self.options.video_delay, self.options.output_latency)
    }

    /// Pick the correction for the next candidate video frame.
    pub fn synchronize_video(&mut self, frame: &FrameTiming) -> SyncDecision {
        let desired = self.desired_video_time();
        self.sync_policy.synchronize(desired, frame)
    }

    /// Install the available bit rates (ascending), clearing history.
    pub fn set_bit_rates(&mut self, bit_rates: Vec<i64>, fps: f32) {
        self.bit_rate = Some(BitRateState::new(bit_rates, fps));
    }

    /// Disable adaptation.
    pub fn clear_bit_rates(&mut self) {
        self.bit_rate = None;
    }

    pub fn bit_rate_state(&self) -> Option<&BitRateState> {
        self.bit_rate.as_ref()
    }

    /// Record that the pipeline switched to `bit_rate` now.
    pub fn record_bit_rate(&mut self, bit_rate: i64) {
        let now = self.clock.host_now();
        if let Some(state) = self.bit_rate.as_mut() {
            state.record(now, bit_rate);
        }
    }

    /// Refresh the buffer signals the adaptation policy reads.
    pub fn update_adaptation(&mut self, loaded_count: usize, is_playable: bool) {
        if let Some(state) = self.bit_rate.as_mut() {
            state.loaded_count = loaded_count;
            state.is_playable = is_playable;
        }
    }

    /// Ask the adaptation policy for a bitrate step.
    pub fn adapt_bit_rate(&self) -> Option<BitRateSwitch> {
        let now = self.clock.host_now();
        self.adaptation_policy
            .adapt(&self.options, self.bit_rate.as_ref(), now)
    }

    /// Playback rate for live streams; `None` for on-demand content.
    pub fn live_playback_rate(&self, loading: &LoadingState) -> Option<f32> {
        if !self.options.is_live {
            return None;
        }
        self.rate_policy.playback_rate(&self.options, loading)
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("state", &self.state)
            .field("is_first", &self.is_first)
            .field("is_seek", &self.is_seek)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::rate::BufferDrivenRate;
    use crate::core::media_type::MediaType;
    use crate::playback::clock::ManualHostTime;
    use crate::playback::sync::SyncAction;

    fn session_with(options: PlayerOptions) -> (ManualHostTime, PlaybackSession) {
        let host = ManualHostTime::new(0.0);
        let clock = ReferenceClock::with_host_time(Arc::new(host.clone()));
        (host, PlaybackSession::new(Arc::new(options), clock))
    }

    fn stream(media_type: MediaType, frames: usize, loaded: Seconds) -> CapacitySnapshot {
        CapacitySnapshot {
            media_type,
            packet_count: 10,
            frame_count: frames,
            loaded_time: loaded,
            is_end_of_file: false,
        }
    }

    #[test]
    fn test_opening_to_ready() {
        let (_, mut session) = session_with(PlayerOptions::default());
        assert_eq!(session.state(), PlaybackState::Opening);

        let loading = session.evaluate_loading(&[stream(MediaType::Video, 8, 1.0)]);
        assert!(loading.is_first);
        assert!(!loading.is_playable);
        assert_eq!(session.state(), PlaybackState::Opening);

        let loading = session.evaluate_loading(&[stream(MediaType::Video, 8, 3.0)]);
        assert!(loading.is_playable);
        assert_eq!(session.state(), PlaybackState::ReadyToPlay);

        // is_first is cleared after the first playable check
        let loading = session.evaluate_loading(&[stream(MediaType::Video, 8, 3.0)]);
        assert!(!loading.is_first);
        assert_eq!(session.last_loading(), Some(&loading));
    }

    #[test]
    fn test_auto_play_starts_immediately() {
        let options = PlayerOptions {
            is_auto_play: true,
            ..PlayerOptions::default()
        };
        let (_, mut session) = session_with(options);
        session.evaluate_loading(&[stream(MediaType::Audio, 4, 0.1)]);
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_rebuffer_cycle() {
        let (_, mut session) = session_with(PlayerOptions::default());
        session.evaluate_loading(&[stream(MediaType::Video, 8, 3.0)]);
        assert_eq!(session.play(), PlaybackState::Playing);

        session.evaluate_loading(&[stream(MediaType::Video, 1, 0.0)]);
        assert_eq!(session.state(), PlaybackState::Buffering);

        session.evaluate_loading(&[stream(MediaType::Video, 8, 2.0)]);
        assert_eq!(session.state(), PlaybackState::Buffering);

        session.evaluate_loading(&[stream(MediaType::Video, 8, 3.5)]);
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_paused_stays_paused_while_loading() {
        let (_, mut session) = session_with(PlayerOptions::default());
        session.evaluate_loading(&[stream(MediaType::Video, 8, 3.0)]);
        session.play();
        assert_eq!(session.pause(), PlaybackState::Paused);

        session.evaluate_loading(&[stream(MediaType::Video, 0, 0.0)]);
        assert_eq!(session.state(), PlaybackState::Paused);
        session.evaluate_loading(&[stream(MediaType::Video, 8, 9.0)]);
        assert_eq!(session.state(), PlaybackState::Paused);
        assert_eq!(session.play(), PlaybackState::Playing);
    }

    #[test]
    fn test_play_ignored_while_opening() {
        let (_, mut session) = session_with(PlayerOptions::default());
        assert_eq!(session.play(), PlaybackState::Opening);
    }

    #[test]
    fn test_seek_uses_half_target_for_audio() {
        let (host, mut session) = session_with(PlayerOptions::default());
        session.evaluate_loading(&[stream(MediaType::Audio, 8, 3.0)]);
        session.play();

        host.advance(4.0);
        session.seek(60.0);
        assert_eq!(session.state(), PlaybackState::Seeking { target: 60.0 });
        assert_eq!(session.clock().current_time(), 60.0);

        let loading = session.evaluate_loading(&[stream(MediaType::Audio, 8, 1.0)]);
        assert!(loading.is_seek);
        assert!(!loading.is_playable);

        let loading = session.evaluate_loading(&[stream(MediaType::Audio, 8, 1.5)]);
        assert!(loading.is_playable);
        assert_eq!(session.state(), PlaybackState::Playing);

        let loading = session.evaluate_loading(&[stream(MediaType::Audio, 8, 1.5)]);
        assert!(!loading.is_seek);
    }

    #[test]
    fn test_seek_without_auto_play_pauses() {
        let options = PlayerOptions {
            is_seeked_auto_play: false,
            ..PlayerOptions::default()
        };
        let (_, mut session) = session_with(options);
        session.seek(5.0);
        session.evaluate_loading(&[stream(MediaType::Video, 8, 3.0)]);
        assert_eq!(session.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_drained_streams_finish() {
        let (_, mut session) = session_with(PlayerOptions::default());
        let drained = CapacitySnapshot {
            media_type: MediaType::Video,
            packet_count: 0,
            frame_count: 0,
            loaded_time: 0.0,
            is_end_of_file: true,
        };
        let loading = session.evaluate_loading(&[drained]);
        assert!(loading.is_playable);
        assert_eq!(session.state(), PlaybackState::Finished);
    }

    #[test]
    fn test_empty_streams_leave_state_alone() {
        let (_, mut session) = session_with(PlayerOptions::default());
        let loading = session.evaluate_loading(&[]);
        assert!(loading.is_playable);
        assert_eq!(session.state(), PlaybackState::Opening);
    }

    #[test]
    fn test_synchronize_applies_video_delay() {
        let options = PlayerOptions {
            video_delay: 0.5,
            ..PlayerOptions::default()
        };
        let (host, mut session) = session_with(options);
        session.clock().set_position(10.0);
        host.advance(1.0);

        assert!((session.desired_video_time() - 10.5).abs() < 1e-12);
        let decision = session.synchronize_video(&FrameTiming {
            presentation_time: 10.5,
            fps: 25.0,
            pending_frames: 3,
        });
        assert_eq!(decision.action, SyncAction::Next);
        assert!(decision.diff.abs() < 1e-12);
    }

    #[test]
    fn test_seek_resets_lag() {
        let (_, mut session) = session_with(PlayerOptions::default());
        session.clock().set_position(10.0);
        let late = FrameTiming {
            presentation_time: 9.0,
            fps: 30.0,
            pending_frames: 1,
        };
        for _ in 0..4 {
            session.synchronize_video(&late);
        }
        session.seek(10.0);
        // a fifth late frame would have dropped; after the reset it is count 1
        assert_eq!(session.synchronize_video(&late).action, SyncAction::Next);
    }

    #[test]
    fn test_custom_sync_policy() {
        struct AlwaysFlush;
        impl VideoSyncPolicy for AlwaysFlush {
            fn synchronize(&mut self, desired_time: Seconds, frame: &FrameTiming) -> SyncDecision {
                SyncDecision {
                    diff: frame.presentation_time - desired_time,
                    action: SyncAction::Flush,
                }
            }
        }
        let (_, session) = session_with(PlayerOptions::default());
        let mut session = session.with_sync_policy(AlwaysFlush);
        let decision = session.synchronize_video(&FrameTiming {
            presentation_time: 0.0,
            fps: 30.0,
            pending_frames: 1,
        });
        assert_eq!(decision.action, SyncAction::Flush);
    }

    #[test]
    fn test_overrides_change_effective_options() {
        let (_, mut session) = session_with(PlayerOptions::default());
        let overrides = SessionOverrides {
            preferred_forward_buffer_duration: Some(1.0),
            ..SessionOverrides::default()
        };
        session.set_overrides(overrides).unwrap();
        assert_eq!(session.options().preferred_forward_buffer_duration, 1.0);
        assert_eq!(session.base_options().preferred_forward_buffer_duration, 3.0);

        session.evaluate_loading(&[stream(MediaType::Video, 8, 1.0)]);
        assert_eq!(session.state(), PlaybackState::ReadyToPlay);

        let bad = SessionOverrides {
            max_buffer_duration: Some(0.0),
            ..SessionOverrides::default()
        };
        assert!(session.set_overrides(bad).is_err());
        assert_eq!(session.options().preferred_forward_buffer_duration, 1.0);
    }

    #[test]
    fn test_bit_rate_adaptation_flow() {
        let (host, mut session) = session_with(PlayerOptions::default());
        assert_eq!(session.adapt_bit_rate(), None);

        session.set_bit_rates(vec![500, 1000, 2000], 30.0);
        session.record_bit_rate(1000);
        session.update_adaptation(500, true);
        assert_eq!(session.adapt_bit_rate(), None);

        host.advance(15.0);
        assert_eq!(
            session.adapt_bit_rate(),
            Some(BitRateSwitch { from: 1000, to: 2000 })
        );

        session.record_bit_rate(2000);
        host.advance(15.0);
        assert_eq!(session.adapt_bit_rate(), None);

        session.update_adaptation(10, false);
        assert_eq!(
            session.adapt_bit_rate(),
            Some(BitRateSwitch { from: 2000, to: 1000 })
        );

        session.clear_bit_rates();
        assert!(session.bit_rate_state().is_none());
        assert_eq!(session.adapt_bit_rate(), None);
    }

    #[test]
    fn test_live_rate_only_for_live() {
        let (_, session) = session_with(PlayerOptions::default());
        let session = session.with_rate_policy(BufferDrivenRate::default());
        let loading = LoadingState {
            loaded_time: 20.0,
            progress: 0.0,
            packet_count: 0,
            frame_count: 0,
            is_end_of_file: false,
            is_playable: true,
            is_first: false,
            is_seek: false,
        };
        assert_eq!(session.live_playback_rate(&loading), None);

        let options = PlayerOptions {
            is_live: true,
            ..PlayerOptions::default()
        };
        let (_, session) = session_with(options);
        assert_eq!(session.live_playback_rate(&loading), None);
        let session = session.with_rate_policy(BufferDrivenRate::default());
        assert_eq!(session.live_playback_rate(&loading), Some(1.2));
    }

    #[test]
    fn test_starts_at_start_play_time() {
        let options = PlayerOptions {
            start_play_time: 42.0,
            ..PlayerOptions::default()
        };
        let (_, session) = session_with(options);
        assert_eq!(session.clock().current_time(), 42.0);
    }
}
