//! Data models for mix identification

pub mod mix_info;
pub mod track;

pub use mix_info::MixInfo;
pub use track::{format_position, parse_position, Track, TrackTiming, TrackValidationError};
