//! mixscan - track identification for long-form audio mixes
//!
//! Segments a mix into fixed-length, optionally overlapping analysis
//! windows, submits each window to external audio-identification services,
//! and reconciles the noisy per-segment hits into a deduplicated,
//! chronologically ordered tracklist written as JSON, Markdown, and M3U.

pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod providers;
pub mod services;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::models::{MixInfo, Track, TrackTiming};
pub use crate::output::{OutputFormat, TracklistOutput};
pub use crate::providers::{IdentificationProvider, IdentifiedTrack, ProviderFactory};
pub use crate::services::{
    IdentificationCache, MixAudioSource, MixIdentifier, RequestRateLimiter, TrackMatcher,
};
