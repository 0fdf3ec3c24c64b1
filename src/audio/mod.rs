pub mod output_clock;

pub use output_clock::{buffer_duration, AudioOutputClock, AudioOutputError, SampleSource, Silence};
