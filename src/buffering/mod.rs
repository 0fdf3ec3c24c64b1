pub mod capacity;
pub mod limits;
pub mod loading;

pub use capacity::{Capacity, CapacityCell, CapacitySnapshot};
pub use loading::{evaluate_loading, DefaultLoadingPolicy, LoadingPolicy, LoadingState};
pub use limits::{audio_frame_max_count, video_frame_max_count};
