//! Loading / playability evaluation.
//!
//! Aggregates the snapshots of every active stream into one `LoadingState`
//! that gates playback start and decides when to pause for rebuffering.

use tracing::trace;

use crate::buffering::capacity::CapacitySnapshot;
use crate::config::PlayerOptions;
use crate::core::media_type::MediaType;
use crate::core::time::Seconds;

/// Result of one playability check. Built fresh on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadingState {
    pub loaded_time: Seconds,
    /// Percentage of the preferred buffer filled; may exceed 100
    pub progress: f64,
    pub packet_count: usize,
    pub frame_count: usize,
    pub is_end_of_file: bool,
    pub is_playable: bool,
    /// First check since open
    pub is_first: bool,
    /// First check after a user seek
    pub is_seek: bool,
}

/// Strategy deciding playability from the current snapshots.
pub trait LoadingPolicy: Send {
    fn playable(
        &self,
        options: &PlayerOptions,
        snapshots: &[CapacitySnapshot],
        is_first: bool,
        is_seek: bool,
    ) -> LoadingState;
}

impl<F> LoadingPolicy for F
where
    F: Fn(&PlayerOptions, &[CapacitySnapshot], bool, bool) -> LoadingState + Send,
{
    fn playable(
        &self,
        options: &PlayerOptions,
        snapshots: &[CapacitySnapshot],
        is_first: bool,
        is_seek: bool,
    ) -> LoadingState {
        self(options, snapshots, is_first, is_seek)
    }
}

/// Buffer-target policy: every stream needs the preferred buffer, or half
/// of it when starting audio or in fast-start mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoadingPolicy;

impl LoadingPolicy for DefaultLoadingPolicy {
    fn playable(
        &self,
        options: &PlayerOptions,
        snapshots: &[CapacitySnapshot],
        is_first: bool,
        is_seek: bool,
    ) -> LoadingState {
        evaluate_loading(options, snapshots, is_first, is_seek)
    }
}

/// Aggregate `snapshots` into a `LoadingState`.
///
/// An empty slice is vacuously end-of-file and playable; callers that can
/// have zero active streams must guard against that themselves.
pub fn evaluate_loading(
    options: &PlayerOptions,
    snapshots: &[CapacitySnapshot],
    is_first: bool,
    is_seek: bool,
) -> LoadingState {
    let packet_count = snapshots.iter().map(|c| c.packet_count).min().unwrap_or(0);
    let frame_count = snapshots.iter().map(|c| c.frame_count).min().unwrap_or(0);
    let is_end_of_file = snapshots.iter().all(|c| c.is_end_of_file);
    let loaded_time = snapshots
        .iter()
        .map(|c| c.loaded_time)
        .fold(None, |min: Option<Seconds>, t| Some(min.map_or(t, |m| m.min(t))))
        .unwrap_or(0.0);

    let target = options.preferred_forward_buffer_duration;
    debug_assert!(target > 0.0, "preferred_forward_buffer_duration must be positive");
    let progress = if target > 0.0 {
        loaded_time * 100.0 / target
    } else {
        0.0
    };

    let is_playable = snapshots
        .iter()
        .all(|capacity| stream_playable(options, capacity, is_first, is_seek));

    trace!(
        loaded_time,
        progress,
        packet_count,
        frame_count,
        is_end_of_file,
        is_playable,
        "loading evaluated"
    );

    LoadingState {
        loaded_time,
        progress,
        packet_count,
        frame_count,
        is_end_of_file,
        is_playable,
        is_first,
        is_seek,
    }
}

fn stream_playable(
    options: &PlayerOptions,
    capacity: &CapacitySnapshot,
    is_first: bool,
    is_seek: bool,
) -> bool {
    if capacity.is_drained() {
        return true;
    }
    // two decoded frames are needed to establish timing
    if capacity.frame_count < 2 {
        return false;
    }
    if capacity.is_end_of_file {
        return true;
    }
    let sync_decode = match capacity.media_type {
        MediaType::Audio => options.sync_decode_audio,
        MediaType::Video => options.sync_decode_video,
        MediaType::Subtitle => false,
    };
    if sync_decode {
        return true;
    }
    let target = options.preferred_forward_buffer_duration;
    if (is_first || is_seek) && (capacity.media_type.is_audio() || options.is_second_open) {
        // admits a first-open stream with almost nothing buffered
        return is_first || capacity.loaded_time >= target / 2.0;
    }
    capacity.loaded_time >= target
}
