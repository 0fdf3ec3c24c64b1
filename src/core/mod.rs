//! Core types shared by every subsystem.
//!
//! All time values are seconds on the stream timeline (`Seconds`, an f64).

pub mod media_type;
pub mod time;

pub use media_type::MediaType;
pub use time::Seconds;
