pub mod bitrate;
pub mod rate;

pub use bitrate::{
    evaluate_bitrate_adaptation, AdaptationPolicy, BitRateSample, BitRateState, BitRateSwitch,
    DefaultAdaptationPolicy,
};
pub use rate::{BufferDrivenRate, FixedRate, LivePlaybackRate};
