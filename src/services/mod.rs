//! Services for mix identification

pub mod audio_source;
pub mod cache;
pub mod identifier;
pub mod rate_limiter;
pub mod segmenter;
pub mod similarity;
pub mod track_matcher;

pub use audio_source::{AudioSourceError, MixAudioSource};
pub use cache::IdentificationCache;
pub use identifier::MixIdentifier;
pub use rate_limiter::RequestRateLimiter;
pub use segmenter::{plan_windows, SegmentWindow};
pub use track_matcher::TrackMatcher;
