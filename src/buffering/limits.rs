//! Decoded-frame queue limits.

/// Maximum decoded video frames kept queued. Live streams stay shallow so
/// latency does not build up.
pub fn video_frame_max_count(is_live: bool) -> u8 {
    if is_live {
        4
    } else {
        16
    }
}

/// Maximum decoded audio frames kept queued: a quarter of
/// `fps * channels`, saturating at `u8::MAX`.
pub fn audio_frame_max_count(fps: f32, channel_count: usize) -> u8 {
    let fps = if fps.is_finite() && fps > 0.0 { fps as usize } else { 0 };
    let count = fps.saturating_mul(channel_count) >> 2;
    u8::try_from(count).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_limits() {
        assert_eq!(video_frame_max_count(true), 4);
        assert_eq!(video_frame_max_count(false), 16);
    }

    #[test]
    fn test_audio_limits() {
        // 44.1 kHz AAC: ~43 packets/s stereo
        assert_eq!(audio_frame_max_count(43.07, 2), 21);
        assert_eq!(audio_frame_max_count(50.0, 8), 100);
        assert_eq!(audio_frame_max_count(0.0, 2), 0);
    }

    #[test]
    fn test_audio_limits_saturate() {
        assert_eq!(audio_frame_max_count(1000.0, 8), u8::MAX);
        assert_eq!(audio_frame_max_count(127.0, 8), 254);
        assert_eq!(audio_frame_max_count(128.0, 8), u8::MAX);
    }
}
