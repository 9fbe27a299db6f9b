//! Track reconciliation engine
//!
//! Accumulates raw per-segment identification hits and merges them into a
//! deduplicated, chronologically ordered tracklist. Overlapping analysis
//! windows report the same song several times with varying metadata
//! formatting and confidence; the engine groups similar-and-nearby hits and
//! keeps one representative per group, while preserving genuine repeat plays
//! detected in well-separated segments.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::IdentificationConfig;
use crate::models::Track;
use crate::services::similarity::is_similar;

/// Reconciles raw identification hits into a final tracklist
///
/// One instance accumulates the hits of a single run via [`add_track`] and is
/// drained once by the terminal [`merge_nearby_tracks`] pass.
///
/// [`add_track`]: TrackMatcher::add_track
/// [`merge_nearby_tracks`]: TrackMatcher::merge_nearby_tracks
#[derive(Debug)]
pub struct TrackMatcher {
    tracks: Vec<Track>,
    min_confidence: f32,
    time_threshold: f64,
    max_duplicates: usize,
    segment_length: u64,
}

impl TrackMatcher {
    /// Create a matcher from the identification configuration
    pub fn new(config: &IdentificationConfig) -> Self {
        Self::with_params(
            config.min_confidence,
            config.time_threshold as f64,
            config.max_duplicates,
            config.segment_length,
        )
    }

    /// Create a matcher with explicit parameters
    pub fn with_params(
        min_confidence: f32,
        time_threshold: f64,
        max_duplicates: usize,
        segment_length: u64,
    ) -> Self {
        Self {
            tracks: Vec::new(),
            min_confidence: min_confidence.clamp(0.0, 100.0),
            time_threshold,
            max_duplicates: max_duplicates.max(1),
            segment_length: segment_length.max(1),
        }
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Set the minimum confidence threshold, clamped to 0-100
    pub fn set_min_confidence(&mut self, value: f32) {
        self.min_confidence = value.clamp(0.0, 100.0);
    }

    /// Number of accepted hits currently accumulated
    pub fn accumulated(&self) -> usize {
        self.tracks.len()
    }

    /// Accept a raw hit when its confidence exceeds the threshold
    ///
    /// Hits at or below `min_confidence` are silently dropped; filtering is a
    /// normal outcome, not an error.
    pub fn add_track(&mut self, track: Track) {
        if track.confidence() > self.min_confidence {
            tracing::debug!(
                song = %track.song_name(),
                artist = %track.artist(),
                confidence = track.confidence(),
                "Accepted raw hit"
            );
            self.tracks.push(track);
        } else {
            tracing::debug!(
                song = %track.song_name(),
                confidence = track.confidence(),
                min_confidence = self.min_confidence,
                "Dropped sub-threshold hit"
            );
        }
    }

    /// Merge accumulated hits into the final tracklist
    ///
    /// **Algorithm:**
    /// 1. Sort accepted hits by mix position.
    /// 2. Greedily partition into groups: a hit joins the first group holding
    ///    a similar track whose nearest member is within `time_threshold`
    ///    seconds; otherwise it seeds a new group.
    /// 3. Per group: hits spanning more than one segment bucket are genuine
    ///    repeat plays and are all retained (capped at `max_duplicates`,
    ///    keeping the highest-confidence occurrences); otherwise the group
    ///    collapses to its single highest-confidence hit.
    /// 4. Survivors are returned sorted by position ascending.
    ///
    /// Drains the accumulation; an empty accumulation yields an empty list.
    pub fn merge_nearby_tracks(&mut self) -> Vec<Track> {
        if self.tracks.is_empty() {
            return Vec::new();
        }

        let mut sorted = std::mem::take(&mut self.tracks);
        sort_by_position(&mut sorted);
        let raw_count = sorted.len();

        let mut groups: Vec<Vec<Track>> = Vec::new();
        for track in sorted {
            let position = track.position_to_seconds();
            let target = groups.iter_mut().find(|group| {
                let nearest = group
                    .iter()
                    .map(|member| (member.position_to_seconds() - position).abs())
                    .fold(f64::INFINITY, f64::min);
                nearest <= self.time_threshold
                    && group.iter().any(|member| is_similar(member, &track))
            });
            match target {
                Some(group) => group.push(track),
                None => groups.push(vec![track]),
            }
        }

        let group_count = groups.len();
        let mut merged = Vec::new();
        for group in groups {
            merged.extend(self.select_from_group(group));
        }
        sort_by_position(&mut merged);

        tracing::debug!(
            raw = raw_count,
            groups = group_count,
            merged = merged.len(),
            "Merged nearby tracks"
        );

        merged
    }

    /// Pick the surviving occurrences of one group of similar hits
    fn select_from_group(&self, group: Vec<Track>) -> Vec<Track> {
        let buckets: HashSet<u64> = group
            .iter()
            .map(|t| t.position_to_seconds() as u64 / self.segment_length)
            .collect();

        if buckets.len() > 1 {
            // Distinct segment buckets: genuine repeat plays, keep them all
            // (up to max_duplicates, preferring the confident ones)
            let mut keep = group;
            if keep.len() > self.max_duplicates {
                keep.sort_by(|a, b| compare_confidence(b, a));
                keep.truncate(self.max_duplicates);
                sort_by_position(&mut keep);
            }
            keep
        } else {
            // One detection duplicated across overlapping windows: keep the
            // highest-confidence hit (first wins on ties)
            let best = group
                .into_iter()
                .reduce(|best, t| if t.confidence() > best.confidence() { t } else { best });
            best.into_iter().collect()
        }
    }
}

fn sort_by_position(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| {
        a.position_to_seconds()
            .partial_cmp(&b.position_to_seconds())
            .unwrap_or(Ordering::Equal)
    });
}

fn compare_confidence(a: &Track, b: &Track) -> Ordering {
    a.confidence()
        .partial_cmp(&b.confidence())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format_position;

    fn matcher() -> TrackMatcher {
        // min_confidence 0, threshold 10s, max_duplicates 2, 60s buckets
        TrackMatcher::with_params(0.0, 10.0, 2, 60)
    }

    fn track_at(song: &str, artist: &str, seconds: u64, confidence: f32) -> Track {
        Track::new(song, artist, format_position(seconds as f64), confidence).unwrap()
    }

    #[test]
    fn test_empty_merge() {
        let mut m = matcher();
        assert!(m.merge_nearby_tracks().is_empty());
    }

    #[test]
    fn test_confidence_filter_is_exclusive() {
        let mut m = TrackMatcher::with_params(80.0, 10.0, 2, 60);
        m.add_track(track_at("Song A", "Artist", 0, 80.0)); // at threshold: dropped
        m.add_track(track_at("Song B", "Artist", 10, 79.9));
        m.add_track(track_at("Song C", "Artist", 20, 80.1));
        assert_eq!(m.accumulated(), 1);

        let merged = m.merge_nearby_tracks();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].song_name(), "Song C");
    }

    #[test]
    fn test_min_confidence_is_clamped() {
        let mut m = matcher();
        m.set_min_confidence(250.0);
        assert_eq!(m.min_confidence(), 100.0);
        m.set_min_confidence(-5.0);
        assert_eq!(m.min_confidence(), 0.0);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut m = matcher();
        m.add_track(track_at("Test Track", "Test Artist", 0, 90.0));
        m.add_track(track_at("Test Track", "Test Artist", 5, 85.0));
        m.add_track(track_at("Different Song", "Artist X", 300, 80.0));

        let merged = m.merge_nearby_tracks();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].song_name(), "Test Track");
        assert_eq!(merged[0].confidence(), 90.0);
        assert_eq!(merged[1].song_name(), "Different Song");
    }

    #[test]
    fn test_merge_output_is_ordered() {
        let mut m = matcher();
        m.add_track(track_at("Late Song", "Artist", 600, 70.0));
        m.add_track(track_at("Early Song", "Artist", 0, 70.0));
        m.add_track(track_at("Middle Song", "Artist", 300, 70.0));

        let merged = m.merge_nearby_tracks();
        let seconds: Vec<f64> = merged.iter().map(|t| t.position_to_seconds()).collect();
        assert_eq!(seconds, vec![0.0, 300.0, 600.0]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut m = matcher();
        m.add_track(track_at("Test Track", "Test Artist", 0, 90.0));
        m.add_track(track_at("Test Track", "Test Artist", 5, 85.0));
        m.add_track(track_at("Different Song", "Artist X", 300, 80.0));
        let first = m.merge_nearby_tracks();

        let mut again = matcher();
        for track in first.clone() {
            again.add_track(track);
        }
        let second = again.merge_nearby_tracks();
        assert_eq!(second, first);
    }

    #[test]
    fn test_repeat_plays_in_distinct_buckets_are_kept() {
        let mut m = matcher();
        // Same song detected twice, 8s apart but straddling a 60s bucket edge
        m.add_track(track_at("Anthem", "Artist", 55, 90.0));
        m.add_track(track_at("Anthem", "Artist", 63, 85.0));

        let merged = m.merge_nearby_tracks();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_repeat_plays_capped_at_max_duplicates() {
        let mut m = TrackMatcher::with_params(0.0, 100.0, 2, 60);
        m.add_track(track_at("Anthem", "Artist", 10, 60.0));
        m.add_track(track_at("Anthem", "Artist", 70, 90.0));
        m.add_track(track_at("Anthem", "Artist", 130, 80.0));

        let merged = m.merge_nearby_tracks();
        // Three buckets, cap 2: the two highest-confidence stay, in order
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].position_to_seconds(), 70.0);
        assert_eq!(merged[0].confidence(), 90.0);
        assert_eq!(merged[1].position_to_seconds(), 130.0);
        assert_eq!(merged[1].confidence(), 80.0);
    }

    #[test]
    fn test_distant_duplicates_stay_separate_groups() {
        let mut m = matcher();
        // Similar songs far outside the 10s threshold: separate groups,
        // each surviving on its own
        m.add_track(track_at("Test Track", "Test Artist", 0, 90.0));
        m.add_track(track_at("Test Track", "Test Artist", 300, 85.0));

        let merged = m.merge_nearby_tracks();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_remix_collapses_with_original() {
        let mut m = matcher();
        m.add_track(track_at("Song (Club Mix)", "Artist", 0, 80.0));
        m.add_track(track_at("Song", "Artist", 5, 95.0));

        let merged = m.merge_nearby_tracks();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].song_name(), "Song");
        assert_eq!(merged[0].confidence(), 95.0);
    }

    #[test]
    fn test_numbered_variation_never_collapses() {
        let mut m = matcher();
        m.add_track(track_at("Original Song", "Artist", 0, 90.0));
        m.add_track(track_at("Original Song 2", "Artist", 5, 85.0));

        let merged = m.merge_nearby_tracks();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_tie_keeps_first_by_position() {
        let mut m = matcher();
        m.add_track(track_at("Test Track", "Test Artist", 0, 90.0));
        m.add_track(track_at("Test Track", "Test Artist", 5, 90.0));

        let merged = m.merge_nearby_tracks();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].position_to_seconds(), 0.0);
    }

    #[test]
    fn test_accumulation_is_drained() {
        let mut m = matcher();
        m.add_track(track_at("Song", "Artist", 0, 90.0));
        let first = m.merge_nearby_tracks();
        assert_eq!(first.len(), 1);
        assert_eq!(m.accumulated(), 0);
        assert!(m.merge_nearby_tracks().is_empty());
    }
}
