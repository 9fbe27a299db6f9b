//! Mix identification orchestration
//!
//! Drives the mix through its planned analysis windows: cache lookup,
//! rate-limit acquisition, provider chain, track construction, and finally
//! the reconciliation pass. Per-segment failures are logged and skipped; a
//! run only fails outright when the source itself cannot be processed.

use std::cmp::Ordering;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{format_position, Track};
use crate::providers::IdentificationProvider;
use crate::services::audio_source::MixAudioSource;
use crate::services::cache::IdentificationCache;
use crate::services::rate_limiter::RequestRateLimiter;
use crate::services::segmenter::plan_windows;
use crate::services::track_matcher::TrackMatcher;

/// Maximum wait for a rate-limit permit before skipping a segment
const RATE_LIMIT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-run statistics, logged at completion
#[derive(Debug, Default, Clone)]
pub struct IdentificationStats {
    pub windows_total: usize,
    pub windows_processed: usize,
    pub cache_hits: usize,
    pub provider_hits: usize,
    pub skipped_rate_limit: usize,
    pub merged_tracks: usize,
}

/// Orchestrates one mix-identification run
///
/// All collaborators are injected at construction; the identifier owns no
/// global state and one instance serves one run.
pub struct MixIdentifier {
    config: Config,
    providers: Vec<Box<dyn IdentificationProvider>>,
    cache: Option<IdentificationCache>,
    rate_limiter: Option<RequestRateLimiter>,
    cancel: CancellationToken,
}

impl MixIdentifier {
    pub fn new(
        config: Config,
        providers: Vec<Box<dyn IdentificationProvider>>,
        cache: Option<IdentificationCache>,
        rate_limiter: Option<RequestRateLimiter>,
    ) -> Self {
        Self {
            config,
            providers,
            cache,
            rate_limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for cooperative mid-run cancellation
    ///
    /// Cancelling stops window processing; hits accumulated so far are still
    /// merged and returned.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replace the cancellation token with an externally owned one
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Open a mix audio source, wrapping source failures as run-fatal
    pub fn open_source(path: &std::path::Path) -> Result<MixAudioSource> {
        MixAudioSource::open(path)
            .map_err(|e| Error::identification(format!("cannot process {}", path.display()), e))
    }

    /// Identify the tracks in a mix
    ///
    /// Returns the merged tracklist sorted by timing start (position order
    /// when timing is absent). An empty list is a valid outcome; the caller
    /// decides whether that fails the run.
    pub async fn identify(&self, source: &MixAudioSource) -> Result<Vec<Track>> {
        let total_secs = source.duration_secs();
        let windows = plan_windows(
            total_secs,
            self.config.identification.segment_length,
            self.config.identification.overlap_ratio,
        );

        tracing::info!(
            mix = %source.path().display(),
            duration = %format_position(total_secs),
            windows = windows.len(),
            segment_length = self.config.identification.segment_length,
            overlap_ratio = self.config.identification.overlap_ratio,
            "Starting track identification"
        );

        let mut stats = IdentificationStats {
            windows_total: windows.len(),
            ..Default::default()
        };
        let mut matcher = TrackMatcher::new(&self.config.identification);

        for window in &windows {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    processed = stats.windows_processed,
                    total = stats.windows_total,
                    "Identification cancelled, keeping partial results"
                );
                break;
            }
            stats.windows_processed += 1;

            let position = format_position(window.start_secs);
            tracing::debug!(
                segment = window.index + 1,
                total = windows.len(),
                position = %position,
                "Analyzing segment"
            );

            let key = IdentificationCache::segment_key(
                &source.path().display().to_string(),
                window.start_secs,
            );

            let hit = match self.cache.as_ref().and_then(|cache| cache.get(&key)) {
                Some(hit) => {
                    stats.cache_hits += 1;
                    hit
                }
                None => {
                    let Some(hit) = self.identify_window(source, window, &mut stats).await else {
                        continue;
                    };
                    if let Some(cache) = &self.cache {
                        cache.set(&key, &hit);
                    }
                    hit
                }
            };

            let mut track = match Track::new(&hit.title, &hit.artist, &position, hit.confidence) {
                Ok(track) => track,
                Err(e) => {
                    tracing::warn!(
                        position = %position,
                        error = %e,
                        "Discarding unusable provider hit"
                    );
                    continue;
                }
            };

            let duration = hit
                .duration_secs
                .unwrap_or(self.config.identification.segment_length as f64);
            let end = (window.start_secs + duration).min(total_secs);
            if let Err(e) = track.set_timing(window.start_secs, end, hit.confidence) {
                tracing::warn!(position = %position, error = %e, "Discarding invalid timing");
            }

            stats.provider_hits += 1;
            matcher.add_track(track);
        }

        let mut merged = matcher.merge_nearby_tracks();
        sort_by_timing_start(&mut merged);
        stats.merged_tracks = merged.len();

        self.report_timing_quality(&merged);

        tracing::info!(
            windows = stats.windows_processed,
            cache_hits = stats.cache_hits,
            hits = stats.provider_hits,
            skipped_rate_limit = stats.skipped_rate_limit,
            tracks = stats.merged_tracks,
            "Track identification complete"
        );

        Ok(merged)
    }

    /// Run one window through rate limiting and the provider chain
    async fn identify_window(
        &self,
        source: &MixAudioSource,
        window: &crate::services::segmenter::SegmentWindow,
        stats: &mut IdentificationStats,
    ) -> Option<crate::providers::IdentifiedTrack> {
        if self.config.app.rate_limit_enabled {
            if let Some(limiter) = &self.rate_limiter {
                if !limiter.acquire(RATE_LIMIT_ACQUIRE_TIMEOUT).await {
                    tracing::warn!(segment = window.index + 1, "Rate limit exceeded, skipping segment");
                    stats.skipped_rate_limit += 1;
                    return None;
                }
            }
        }

        let audio = match source.read_range_secs(window.start_secs, window.end_secs) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(segment = window.index + 1, error = %e, "Failed to read segment");
                return None;
            }
        };

        for provider in &self.providers {
            match provider.identify(&audio).await {
                Ok(Some(hit)) => {
                    tracing::debug!(
                        provider = provider.name(),
                        title = %hit.title,
                        artist = %hit.artist,
                        confidence = hit.confidence,
                        "Segment identified"
                    );
                    return Some(hit);
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        segment = window.index + 1,
                        error = %e,
                        "Provider failed, trying next"
                    );
                }
            }
        }
        None
    }

    /// Warn about suspicious gaps and overlaps between consecutive tracks
    fn report_timing_quality(&self, tracks: &[Track]) {
        for pair in tracks.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            if current.overlaps_with(next) {
                let overlap = current.end_time().unwrap_or(0.0) - next.start_time().unwrap_or(0.0);
                if overlap >= self.config.timing.min_overlap_threshold {
                    tracing::warn!(
                        position = %current.position_in_mix(),
                        overlap_secs = overlap,
                        "Overlap detected between consecutive tracks"
                    );
                }
            } else if let Some(gap) = current.gap_to(next) {
                if gap > self.config.timing.min_gap_threshold {
                    tracing::warn!(
                        position = %current.position_in_mix(),
                        gap_secs = gap,
                        "Gap detected after track"
                    );
                }
            }
        }
    }
}

fn sort_by_timing_start(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| {
        let ka = a.start_time().unwrap_or_else(|| a.position_to_seconds());
        let kb = b.start_time().unwrap_or_else(|| b.position_to_seconds());
        ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_timing_start_with_fallback() {
        let mut timed = Track::new("A", "Artist", "00:10:00", 90.0).unwrap();
        timed.set_timing(30.0, 200.0, 90.0).unwrap();
        let untimed = Track::new("B", "Artist", "00:01:00", 90.0).unwrap();

        let mut tracks = vec![timed.clone(), untimed.clone()];
        sort_by_timing_start(&mut tracks);

        // The untimed track falls back to its 60s position, after the timed
        // track's 30s start
        assert_eq!(tracks[0].song_name(), "A");
        assert_eq!(tracks[1].song_name(), "B");
    }
}
