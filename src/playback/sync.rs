//! Video-to-clock synchronization.
//!
//! Called once per display refresh with the next candidate video frame.
//! Compares the frame's presentation time with the reference clock and
//! picks a correction. Sustained lag escalates through dropping frames,
//! dropping a GOP, flushing and finally seeking the video track; a delay
//! counter with modulo gates keeps the expensive actions rare.

use std::fmt;

use tracing::warn;

use crate::core::time::{self, Seconds};
use crate::playback::clock::ReferenceClock;

/// Correction the render loop applies for the current refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// Frame is early: keep showing the current picture
    Remain,
    /// Present the frame
    Next,
    /// Present the frame and discard the one after it
    DropNextFrame,
    /// Discard undecoded packets up to the next keyframe
    DropGopPacket,
    /// Discard all queued video and resync
    Flush,
    /// Reposition the video track at the clock
    Seek,
}

impl SyncAction {
    /// True for every action that discards media.
    pub fn is_escalation(self) -> bool {
        !matches!(self, SyncAction::Remain | SyncAction::Next)
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncAction::Remain => "remain",
            SyncAction::Next => "next",
            SyncAction::DropNextFrame => "drop next frame",
            SyncAction::DropGopPacket => "drop gop packet",
            SyncAction::Flush => "flush video track",
            SyncAction::Seek => "seek video track",
        };
        f.write_str(name)
    }
}

/// Timing of the next candidate video frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub presentation_time: Seconds,
    pub fps: f32,
    /// Frames queued in the video pipeline, including this one
    pub pending_frames: usize,
}

/// Outcome of one synchronization step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncDecision {
    /// `presentation_time - desired_time`; negative means video is late
    pub diff: Seconds,
    pub action: SyncAction,
}

/// Whether the synchronizer is currently accumulating lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Normal,
    Lagging,
}

/// Strategy choosing a correction for a frame against a desired time.
pub trait VideoSyncPolicy: Send {
    fn synchronize(&mut self, desired_time: Seconds, frame: &FrameTiming) -> SyncDecision;

    /// Forget accumulated lag (after seeks and flushes).
    fn reset(&mut self) {}
}

/// Default synchronizer. One instance per active video stream.
#[derive(Debug, Clone, Default)]
pub struct VideoClockSynchronizer {
    delay_count: u64,
}

impl VideoClockSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive late frames seen so far
    pub fn delay_count(&self) -> u64 {
        self.delay_count
    }

    pub fn phase(&self) -> SyncPhase {
        if self.delay_count == 0 {
            SyncPhase::Normal
        } else {
            SyncPhase::Lagging
        }
    }

    /// Synchronize against a live clock, applying the video delay and
    /// output latency offsets.
    pub fn synchronize_with_clock(
        &mut self,
        clock: &ReferenceClock,
        video_delay: Seconds,
        output_latency: Seconds,
        frame: &FrameTiming,
    ) -> SyncDecision {
        let desired = desired_time(clock, video_delay, output_latency);
        self.step(desired, frame)
    }

    fn step(&mut self, desired: Seconds, frame: &FrameTiming) -> SyncDecision {
        let diff = frame.presentation_time - desired;

        // ahead by more than the fastest refresh we distinguish
        if diff >= time::refresh_tolerance() {
            self.delay_count = 0;
            return SyncDecision {
                diff,
                action: SyncAction::Remain,
            };
        }

        debug_assert!(frame.fps > 0.0, "frame rate must be positive");
        let late_threshold = match time::frame_interval(frame.fps) {
            Some(interval) => -4.0 * interval,
            None => Seconds::NEG_INFINITY,
        };
        if diff >= late_threshold {
            self.delay_count = 0;
            return SyncDecision {
                diff,
                action: SyncAction::Next,
            };
        }

        self.delay_count += 1;
        let count = self.delay_count;
        let action = if frame.pending_frames == 1 {
            if diff < -1.0 && count % 10 == 0 {
                SyncAction::DropGopPacket
            } else if count % 5 == 0 {
                SyncAction::DropNextFrame
            } else {
                SyncAction::Next
            }
        } else if diff < -8.0 && count % 100 == 0 {
            SyncAction::Seek
        } else if diff < -1.0 && count % 10 == 0 {
            SyncAction::Flush
        } else if count % 2 == 0 {
            SyncAction::DropNextFrame
        } else {
            SyncAction::Next
        };

        if action.is_escalation() {
            warn!(
                "[video] video delay={:.3}, clock={:.3}, delay count={}, frameCount={} {}",
                diff, desired, count, frame.pending_frames, action
            );
        }

        SyncDecision { diff, action }
    }
}

impl VideoSyncPolicy for VideoClockSynchronizer {
    fn synchronize(&mut self, desired_time: Seconds, frame: &FrameTiming) -> SyncDecision {
        self.step(desired_time, frame)
    }

    fn reset(&mut self) {
        self.delay_count = 0;
    }
}

/// Time video should be showing now.
pub fn desired_time(clock: &ReferenceClock, video_delay: Seconds, output_latency: Seconds) -> Seconds {
    clock.current_time() - video_delay - output_latency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::clock::ManualHostTime;
    use std::sync::Arc;

    fn frame(presentation_time: Seconds, fps: f32, pending_frames: usize) -> FrameTiming {
        FrameTiming {
            presentation_time,
            fps,
            pending_frames,
        }
    }

    #[test]
    fn test_on_time_frame_advances() {
        let mut sync = VideoClockSynchronizer::new();
        let decision = sync.synchronize(10.0, &frame(10.0, 30.0, 3));
        assert_eq!(decision.diff, 0.0);
        assert_eq!(decision.action, SyncAction::Next);
        assert_eq!(sync.delay_count(), 0);
        assert_eq!(sync.phase(), SyncPhase::Normal);
    }

    #[test]
    fn test_on_time_resets_delay() {
        let mut sync = VideoClockSynchronizer::new();
        sync.synchronize(10.0, &frame(9.5, 30.0, 1));
        sync.synchronize(10.0, &frame(9.5, 30.0, 1));
        assert_eq!(sync.delay_count(), 2);
        assert_eq!(sync.phase(), SyncPhase::Lagging);

        let decision = sync.synchronize(10.0, &frame(10.0, 30.0, 1));
        assert_eq!(decision.action, SyncAction::Next);
        assert_eq!(sync.delay_count(), 0);
    }

    #[test]
    fn test_early_frame_remains() {
        let mut sync = VideoClockSynchronizer::new();
        for _ in 0..7 {
            sync.synchronize(10.0, &frame(8.0, 30.0, 4));
        }
        assert_eq!(sync.delay_count(), 7);

        let decision = sync.synchronize(10.0, &frame(10.01, 30.0, 4));
        assert_eq!(decision.action, SyncAction::Remain);
        assert_eq!(sync.delay_count(), 0);

        let decision = sync.synchronize(10.0, &frame(12.0, 30.0, 1));
        assert_eq!(decision.action, SyncAction::Remain);
        assert!((decision.diff - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_slightly_early_frame_still_advances() {
        let mut sync = VideoClockSynchronizer::new();
        let decision = sync.synchronize(10.0, &frame(10.005, 30.0, 2));
        assert_eq!(decision.action, SyncAction::Next);
    }

    #[test]
    fn test_small_lag_is_tolerated() {
        let mut sync = VideoClockSynchronizer::new();
        // -0.1 is within four frame intervals at 30 fps (-0.1333)
        for _ in 0..20 {
            let decision = sync.synchronize(10.0, &frame(9.9, 30.0, 1));
            assert_eq!(decision.action, SyncAction::Next);
        }
        assert_eq!(sync.delay_count(), 0);
    }

    #[test]
    fn test_single_frame_lag_drops_every_fifth() {
        let mut sync = VideoClockSynchronizer::new();
        let mut previous = sync.delay_count();
        for call in 1..=10u64 {
            let decision = sync.synchronize(10.0, &frame(9.5, 30.0, 1));
            let expected = if call % 5 == 0 {
                SyncAction::DropNextFrame
            } else {
                SyncAction::Next
            };
            assert_eq!(decision.action, expected, "call {}", call);
            assert!(sync.delay_count() > previous);
            previous = sync.delay_count();
        }
        assert_eq!(sync.delay_count(), 10);
    }

    #[test]
    fn test_single_frame_heavy_lag_drops_gop() {
        let mut sync = VideoClockSynchronizer::new();
        for _ in 0..9 {
            sync.synchronize(10.0, &frame(8.0, 30.0, 1));
        }
        let decision = sync.synchronize(10.0, &frame(8.0, 30.0, 1));
        assert_eq!(sync.delay_count(), 10);
        assert_eq!(decision.action, SyncAction::DropGopPacket);

        // count 15 is a multiple of 5 but not 10
        for _ in 0..4 {
            sync.synchronize(10.0, &frame(8.0, 30.0, 1));
        }
        let decision = sync.synchronize(10.0, &frame(8.0, 30.0, 1));
        assert_eq!(decision.action, SyncAction::DropNextFrame);
    }

    #[test]
    fn test_backlog_drops_every_other_frame() {
        let mut sync = VideoClockSynchronizer::new();
        let actions: Vec<_> = (0..4)
            .map(|_| sync.synchronize(10.0, &frame(9.5, 30.0, 5)).action)
            .collect();
        assert_eq!(
            actions,
            vec![
                SyncAction::Next,
                SyncAction::DropNextFrame,
                SyncAction::Next,
                SyncAction::DropNextFrame,
            ]
        );
    }

    #[test]
    fn test_backlog_flushes_on_tenth() {
        let mut sync = VideoClockSynchronizer::new();
        let mut last = None;
        for _ in 0..10 {
            last = Some(sync.synchronize(10.0, &frame(8.0, 30.0, 5)).action);
        }
        assert_eq!(last, Some(SyncAction::Flush));

        // lag under one second never flushes
        let mut sync = VideoClockSynchronizer::new();
        for _ in 0..10 {
            last = Some(sync.synchronize(10.0, &frame(9.5, 30.0, 5)).action);
        }
        assert_eq!(last, Some(SyncAction::DropNextFrame));
    }

    #[test]
    fn test_backlog_seeks_on_hundredth() {
        let mut sync = VideoClockSynchronizer::new();
        let mut seeks = 0;
        let mut flushes = 0;
        for _ in 0..100 {
            match sync.synchronize(20.0, &frame(10.0, 30.0, 8)).action {
                SyncAction::Seek => seeks += 1,
                SyncAction::Flush => flushes += 1,
                _ => {}
            }
        }
        assert_eq!(seeks, 1);
        // 10, 20, ..., 90
        assert_eq!(flushes, 9);
        assert_eq!(sync.delay_count(), 100);
    }

    #[test]
    fn test_reset_clears_delay() {
        let mut sync = VideoClockSynchronizer::new();
        sync.synchronize(10.0, &frame(9.0, 30.0, 2));
        VideoSyncPolicy::reset(&mut sync);
        assert_eq!(sync.delay_count(), 0);
    }

    #[test]
    fn test_zero_fps_never_lags() {
        let mut sync = VideoClockSynchronizer::new();
        // release-mode fallback; debug builds assert instead
        if cfg!(debug_assertions) {
            return;
        }
        let decision = sync.synchronize(10.0, &frame(0.0, 0.0, 1));
        assert_eq!(decision.action, SyncAction::Next);
    }

    #[test]
    fn test_synchronize_with_clock_applies_offsets() {
        let host = ManualHostTime::new(0.0);
        let clock = ReferenceClock::with_host_time(Arc::new(host.clone()));
        clock.set_position(10.0);
        host.advance(0.5);

        let mut sync = VideoClockSynchronizer::new();
        // desired = 10.5 - 0.2 - 0.05 = 10.25
        let decision = sync.synchronize_with_clock(&clock, 0.2, 0.05, &frame(10.25, 30.0, 2));
        assert!(decision.diff.abs() < 1e-9);
        assert_eq!(decision.action, SyncAction::Next);

        assert!((desired_time(&clock, 0.0, 0.0) - 10.5).abs() < 1e-12);
    }

    #[test]
    fn test_escalation_classification() {
        assert!(!SyncAction::Remain.is_escalation());
        assert!(!SyncAction::Next.is_escalation());
        assert!(SyncAction::DropNextFrame.is_escalation());
        assert!(SyncAction::Seek.is_escalation());
        assert_eq!(SyncAction::DropGopPacket.to_string(), "drop gop packet");
    }
}
