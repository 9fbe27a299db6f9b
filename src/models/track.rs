//! Track and timing value types
//!
//! A [`Track`] is one identified song occurrence inside a mix: immutable
//! identity fields (song name, artist, position, identification confidence)
//! plus optional [`TrackTiming`] attached once the play window is known.
//!
//! Timing is only ever constructed whole through [`Track::set_timing`], which
//! rejects inverted ranges, so a negative duration is unrepresentable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Track construction/mutation validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackValidationError {
    /// Song name empty or whitespace-only
    #[error("Song name cannot be empty")]
    EmptySongName,

    /// Artist empty or whitespace-only
    #[error("Artist cannot be empty")]
    EmptyArtist,

    /// Position missing or not canonical HH:MM:SS
    #[error("Invalid position in mix: {0:?}")]
    InvalidPosition(String),

    /// Confidence outside 0-100
    #[error("Confidence must be between 0 and 100, got {0}")]
    ConfidenceOutOfRange(f32),

    /// Timing end before start
    #[error("End time {end} cannot be less than start time {start}")]
    InvalidTimingRange { start: f64, end: f64 },
}

/// Precise timing information for a track within the mix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackTiming {
    start_time: f64,
    end_time: f64,
    confidence: f32,
}

impl TrackTiming {
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Track duration in seconds (never negative, see [`Track::set_timing`])
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Two timings overlap iff each starts before the other ends
    pub fn overlaps(&self, other: &TrackTiming) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }

    /// Gap in seconds from the end of `self` to the start of `other`
    ///
    /// Zero when the timings overlap or touch.
    pub fn gap_to(&self, other: &TrackTiming) -> f64 {
        (other.start_time - self.end_time).max(0.0)
    }
}

/// Parse a canonical `HH:MM:SS` position into seconds
///
/// Strict: exactly three numeric components, minutes and seconds below 60.
pub fn parse_position(text: &str) -> Option<f64> {
    let mut parts = text.split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(f64::from(hours * 3600 + minutes * 60 + seconds))
}

/// Format seconds as a canonical `HH:MM:SS` position
pub fn format_position(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// One identified song occurrence inside a mix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackData", into = "TrackData")]
pub struct Track {
    song_name: String,
    artist: String,
    position_in_mix: String,
    confidence: f32,
    timing: Option<TrackTiming>,
}

/// Plain mapping representation of a [`Track`] for serialization
///
/// Deserializing a `Track` goes through this struct so that constructor
/// validation re-runs on every inbound record (cache entries, JSON output
/// read back by other tools).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackData {
    pub song_name: String,
    pub artist: String,
    pub position_in_mix: String,
    pub confidence: f32,
    #[serde(default)]
    pub timing: Option<TrackTiming>,
}

impl TryFrom<TrackData> for Track {
    type Error = TrackValidationError;

    fn try_from(data: TrackData) -> Result<Self, Self::Error> {
        let mut track = Track::new(
            data.song_name,
            data.artist,
            data.position_in_mix,
            data.confidence,
        )?;
        if let Some(timing) = data.timing {
            track.set_timing(timing.start_time, timing.end_time, timing.confidence)?;
        }
        Ok(track)
    }
}

impl From<Track> for TrackData {
    fn from(track: Track) -> Self {
        TrackData {
            song_name: track.song_name,
            artist: track.artist,
            position_in_mix: track.position_in_mix,
            confidence: track.confidence,
            timing: track.timing,
        }
    }
}

impl Track {
    /// Create a new track, validating all identity fields
    ///
    /// # Errors
    /// Returns a [`TrackValidationError`] distinguishing the offending field:
    /// empty song name, empty artist, empty or malformed position, or
    /// confidence outside 0-100.
    pub fn new(
        song_name: impl Into<String>,
        artist: impl Into<String>,
        position_in_mix: impl Into<String>,
        confidence: f32,
    ) -> Result<Self, TrackValidationError> {
        let song_name = song_name.into().trim().to_string();
        let artist = artist.into().trim().to_string();
        let position_in_mix = position_in_mix.into().trim().to_string();

        if song_name.is_empty() {
            return Err(TrackValidationError::EmptySongName);
        }
        if artist.is_empty() {
            return Err(TrackValidationError::EmptyArtist);
        }
        if position_in_mix.is_empty() || parse_position(&position_in_mix).is_none() {
            return Err(TrackValidationError::InvalidPosition(position_in_mix));
        }
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(TrackValidationError::ConfidenceOutOfRange(confidence));
        }

        Ok(Self {
            song_name,
            artist,
            position_in_mix,
            confidence,
            timing: None,
        })
    }

    pub fn song_name(&self) -> &str {
        &self.song_name
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn position_in_mix(&self) -> &str {
        &self.position_in_mix
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn timing(&self) -> Option<&TrackTiming> {
        self.timing.as_ref()
    }

    /// Set the timing information for this track, replacing any previous value
    ///
    /// # Errors
    /// Rejects `end < start` and confidence outside 0-100; the previous
    /// timing is left untouched on failure.
    pub fn set_timing(
        &mut self,
        start: f64,
        end: f64,
        confidence: f32,
    ) -> Result<(), TrackValidationError> {
        if end < start {
            return Err(TrackValidationError::InvalidTimingRange { start, end });
        }
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(TrackValidationError::ConfidenceOutOfRange(confidence));
        }
        self.timing = Some(TrackTiming {
            start_time: start,
            end_time: end,
            confidence,
        });
        Ok(())
    }

    /// Remove timing information entirely
    pub fn clear_timing(&mut self) {
        self.timing = None;
    }

    pub fn start_time(&self) -> Option<f64> {
        self.timing.map(|t| t.start_time)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.timing.map(|t| t.end_time)
    }

    pub fn duration(&self) -> Option<f64> {
        self.timing.map(|t| t.duration())
    }

    pub fn timing_confidence(&self) -> Option<f32> {
        self.timing.map(|t| t.confidence)
    }

    /// Convert the mix position to seconds
    ///
    /// The constructor guarantees a parseable position, so failure here means
    /// the value went stale through an unchecked path; it is logged and
    /// degrades to 0 rather than aborting a merge pass.
    pub fn position_to_seconds(&self) -> f64 {
        match parse_position(&self.position_in_mix) {
            Some(seconds) => seconds,
            None => {
                tracing::warn!(position = %self.position_in_mix, "Invalid position format");
                0.0
            }
        }
    }

    /// Format the track duration as `MM:SS`, or `--:--` when untimed
    pub fn format_duration(&self) -> String {
        match &self.timing {
            None => "--:--".to_string(),
            Some(timing) => {
                let mut duration = timing.duration();
                // Very short durations round up to a full second
                if duration > 0.0 && duration < 1.0 {
                    duration = 1.0;
                }
                let total = duration as u64;
                format!("{:02}:{:02}", total / 60, total % 60)
            }
        }
    }

    /// Whether this track's play window overlaps another's
    ///
    /// Reports no overlap when either side is untimed.
    pub fn overlaps_with(&self, other: &Track) -> bool {
        match (&self.timing, &other.timing) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => false,
        }
    }

    /// Gap in seconds from this track's end to another's start
    ///
    /// `None` when either side is untimed.
    pub fn gap_to(&self, other: &Track) -> Option<f64> {
        match (&self.timing, &other.timing) {
            (Some(a), Some(b)) => Some(a.gap_to(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.position_in_mix, self.artist, self.song_name
        )?;
        if self.timing.is_some() {
            write!(f, " [{}]", self.format_duration())?;
        }
        write!(f, " ({:.0}%)", self.confidence)
    }
}
