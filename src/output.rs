//! Tracklist output writers
//!
//! Renders the final tracklist as JSON, Markdown, and M3U files. The caller
//! guarantees the list is merged, sorted, and invariant-satisfying; the
//! writers only format.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use serde_json::json;

use crate::config::TimingConfig;
use crate::error::{Error, Result};
use crate::models::{MixInfo, Track};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
    M3u,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
            OutputFormat::M3u => "m3u",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
            OutputFormat::M3u => "m3u",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "m3u" => Ok(OutputFormat::M3u),
            other => Err(Error::Output(format!("unsupported format: {other}"))),
        }
    }
}

/// A reported gap or overlap between two consecutive tracks
#[derive(Debug)]
struct TimingIssue {
    index: usize,
    seconds: f64,
}

/// Renders and saves tracklists for one identified mix
pub struct TracklistOutput {
    tracks: Vec<Track>,
    mix_info: MixInfo,
    timing: TimingConfig,
    output_dir: PathBuf,
}

impl TracklistOutput {
    pub fn new(
        tracks: Vec<Track>,
        mix_info: MixInfo,
        timing: TimingConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tracks,
            mix_info,
            timing,
            output_dir: output_dir.into(),
        }
    }

    /// Save the tracklist in one format, returning the written path
    pub fn save(&self, format: OutputFormat) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(self.filename(format));
        let content = match format {
            OutputFormat::Json => self.render_json()?,
            OutputFormat::Markdown => self.render_markdown(),
            OutputFormat::M3u => self.render_m3u(),
        };
        std::fs::write(&path, content)?;
        tracing::info!(format = format.as_str(), path = %path.display(), "Saved tracklist");
        Ok(path)
    }

    /// Save the tracklist in several formats
    pub fn save_all(&self, formats: &[OutputFormat]) -> Result<Vec<PathBuf>> {
        formats.iter().map(|f| self.save(*f)).collect()
    }

    /// Filename: `[YYYYMMDD] {artist - }title.{ext}`
    fn filename(&self, format: OutputFormat) -> String {
        let date = self
            .mix_info
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or_else(|| Local::now().date_naive());

        let name = match &self.mix_info.artist {
            Some(artist) => format!("{} - {}", artist, self.mix_info.title),
            None => self.mix_info.title.clone(),
        };
        format!(
            "[{}] {}.{}",
            date.format("%Y%m%d"),
            sanitize_filename(&name),
            format.extension()
        )
    }

    fn total_duration(&self) -> f64 {
        self.tracks.iter().filter_map(|t| t.duration()).sum()
    }

    fn gaps(&self) -> Vec<TimingIssue> {
        self.tracks
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let gap = pair[0].gap_to(&pair[1])?;
                (gap > self.timing.min_gap_threshold).then_some(TimingIssue {
                    index: i,
                    seconds: gap,
                })
            })
            .collect()
    }

    fn overlaps(&self) -> Vec<TimingIssue> {
        self.tracks
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                if !pair[0].overlaps_with(&pair[1]) {
                    return None;
                }
                let overlap = pair[0].end_time()? - pair[1].start_time()?;
                (overlap >= self.timing.min_overlap_threshold).then_some(TimingIssue {
                    index: i,
                    seconds: overlap,
                })
            })
            .collect()
    }

    fn render_json(&self) -> Result<String> {
        let gaps = self.gaps();
        let overlaps = self.overlaps();
        let confidences: Vec<f32> = self.tracks.iter().map(|t| t.confidence()).collect();
        let (average, min_confidence, max_confidence) = if confidences.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                confidences.iter().sum::<f32>() / confidences.len() as f32,
                confidences.iter().cloned().fold(f32::INFINITY, f32::min),
                confidences.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
            )
        };

        let tracks: Vec<serde_json::Value> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let next = self.tracks.get(i + 1);
                json!({
                    "song_name": track.song_name(),
                    "artist": track.artist(),
                    "position_in_mix": track.position_in_mix(),
                    "confidence": track.confidence(),
                    "timing": track.timing().map(|t| json!({
                        "start_time": t.start_time(),
                        "end_time": t.end_time(),
                        "duration": t.duration(),
                        "duration_formatted": track.format_duration(),
                        "confidence": t.confidence(),
                    })),
                    "gap_to_next": next.and_then(|n| track.gap_to(n)),
                    "overlaps_next": next.map(|n| track.overlaps_with(n)),
                })
            })
            .collect();

        let report = json!({
            "mix_info": {
                "title": &self.mix_info.title,
                "artist": &self.mix_info.artist,
                "date": &self.mix_info.date,
                "source": &self.mix_info.source,
                "duration": crate::models::format_position(self.mix_info.duration_secs),
                "track_count": self.tracks.len(),
            },
            "analysis_info": {
                "timestamp": Local::now().to_rfc3339(),
                "track_count": self.tracks.len(),
                "average_confidence": average,
                "min_confidence": min_confidence,
                "max_confidence": max_confidence,
                "total_track_duration": self.total_duration(),
                "gaps_detected": gaps.len(),
                "overlaps_detected": overlaps.len(),
                "timing_quality": {
                    "gaps": gaps.iter().map(|g| json!({
                        "position": format!("Between track {} and {}", g.index + 1, g.index + 2),
                        "duration": g.seconds,
                        "start_track": self.tracks[g.index].song_name(),
                        "end_track": self.tracks[g.index + 1].song_name(),
                    })).collect::<Vec<_>>(),
                    "overlaps": overlaps.iter().map(|o| json!({
                        "position": format!("Between track {} and {}", o.index + 1, o.index + 2),
                        "duration": o.seconds,
                        "first_track": self.tracks[o.index].song_name(),
                        "second_track": self.tracks[o.index + 1].song_name(),
                    })).collect::<Vec<_>>(),
                },
            },
            "tracks": tracks,
        });

        serde_json::to_string_pretty(&report).map_err(|e| Error::Output(e.to_string()))
    }

    fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.mix_info.title);
        if let Some(artist) = &self.mix_info.artist {
            let _ = writeln!(out, "**Artist:** {artist}");
        }
        if let Some(date) = &self.mix_info.date {
            let _ = writeln!(out, "**Date:** {date}");
        }
        let _ = writeln!(
            out,
            "**Mix Duration:** {}",
            crate::models::format_position(self.mix_info.duration_secs)
        );

        let _ = writeln!(out, "\n## Tracklist\n");
        if self.tracks.is_empty() {
            let _ = writeln!(out, "*No tracks identified*");
        }
        for (i, track) in self.tracks.iter().enumerate() {
            let _ = write!(
                out,
                "{}. **{}** - {} - {}",
                i + 1,
                track.position_in_mix(),
                track.artist(),
                track.song_name()
            );
            if track.timing().is_some() {
                let _ = write!(out, " [{}]", track.format_duration());
            }
            if track.confidence() < 80.0 {
                let _ = write!(out, " _(Confidence: {:.0}%)_", track.confidence());
            }
            if let Some(next) = self.tracks.get(i + 1) {
                if track.overlaps_with(next) {
                    let overlap = track.end_time().unwrap_or(0.0) - next.start_time().unwrap_or(0.0);
                    if overlap >= self.timing.min_overlap_threshold {
                        let _ = write!(out, " [Overlap: {overlap:.1}s]");
                    }
                } else if let Some(gap) = track.gap_to(next) {
                    if gap > self.timing.min_gap_threshold {
                        let _ = write!(out, " [Gap: {gap:.1}s]");
                    }
                }
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "\n## Analysis Summary\n");
        let _ = writeln!(out, "- **Track Count:** {}", self.tracks.len());
        if self.tracks.is_empty() {
            let _ = writeln!(out, "- **Average Confidence:** N/A");
        } else {
            let average = self.tracks.iter().map(|t| t.confidence()).sum::<f32>()
                / self.tracks.len() as f32;
            let _ = writeln!(out, "- **Average Confidence:** {average:.1}%");
        }

        let gaps = self.gaps();
        let overlaps = self.overlaps();
        if !gaps.is_empty() || !overlaps.is_empty() {
            let _ = writeln!(out, "\n### Timing Analysis\n");
            if !gaps.is_empty() {
                let _ = writeln!(out, "#### Gaps Detected\n");
                for gap in &gaps {
                    let track = &self.tracks[gap.index];
                    let _ = writeln!(
                        out,
                        "- **{}** - Gap of {:.1}s after \"{}\"",
                        track.position_in_mix(),
                        gap.seconds,
                        track.song_name()
                    );
                }
            }
            if !overlaps.is_empty() {
                let _ = writeln!(out, "\n#### Overlaps Detected\n");
                for overlap in &overlaps {
                    let _ = writeln!(
                        out,
                        "- **{}** - Overlap of {:.1}s between \"{}\" and \"{}\"",
                        self.tracks[overlap.index].position_in_mix(),
                        overlap.seconds,
                        self.tracks[overlap.index].song_name(),
                        self.tracks[overlap.index + 1].song_name()
                    );
                }
            }
        }
        out
    }

    fn render_m3u(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#EXTM3U");
        let _ = writeln!(out, "#PLAYLIST:{}", self.mix_info.title);
        if let Some(artist) = &self.mix_info.artist {
            let _ = writeln!(out, "#EXTALB:{artist}");
        }

        if self.tracks.is_empty() {
            let _ = writeln!(out, "#EXTINF:-1,No tracks identified");
            return out;
        }

        for (i, track) in self.tracks.iter().enumerate() {
            let duration = track
                .duration()
                .map(|d| d as i64)
                .unwrap_or(-1);
            let _ = writeln!(
                out,
                "#EXTINF:{},{} - {}",
                duration,
                track.artist(),
                track.song_name()
            );

            let _ = write!(out, "#EXTTIME:{}", track.position_in_mix());
            if track.timing().is_some() {
                let _ = write!(out, " (Duration: {})", track.format_duration());
            }
            if let Some(next) = self.tracks.get(i + 1) {
                if track.overlaps_with(next) {
                    let overlap = track.end_time().unwrap_or(0.0) - next.start_time().unwrap_or(0.0);
                    let _ = write!(out, " [Overlap with next: {overlap:.1}s]");
                } else if let Some(gap) = track.gap_to(next) {
                    if gap > self.timing.min_gap_threshold {
                        let _ = write!(out, " [Gap to next: {gap:.1}s]");
                    }
                }
            }
            let _ = writeln!(out);
        }
        out
    }
}

/// Strip filesystem-unsafe characters from a filename component
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect::<String>()
        .trim()
        .to_string()
}
